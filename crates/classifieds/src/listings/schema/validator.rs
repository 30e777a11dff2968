use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{SchemaKey, SchemaRegistry};
use crate::listings::domain::{DetailsMap, ListingType};

/// Whether required fields must be present (`Create`) or may be omitted (`Update`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    Create,
    Update,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("no details schema registered for {0}")]
    SchemaNotFound(SchemaKey),
    #[error("field '{0}' is not allowed for this category")]
    UnknownField(String),
    #[error("field '{0}' is required")]
    MissingRequiredField(String),
    #[error("field '{field}' must be {rule} (got {value})")]
    RuleViolation {
        field: String,
        rule: String,
        value: Value,
    },
    #[error("field '{0}' cannot be changed after creation")]
    ImmutableField(String),
}

impl ValidationError {
    /// Name of the offending field, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::SchemaNotFound(_) => None,
            ValidationError::UnknownField(field)
            | ValidationError::MissingRequiredField(field)
            | ValidationError::ImmutableField(field)
            | ValidationError::RuleViolation { field, .. } => Some(field),
        }
    }

    pub(crate) fn violation(field: &str, rule: impl Into<String>, value: &Value) -> Self {
        ValidationError::RuleViolation {
            field: field.to_string(),
            rule: rule.into(),
            value: value.clone(),
        }
    }
}

/// Details that passed validation for a specific schema key and mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDetails(DetailsMap);

impl ValidatedDetails {
    pub fn as_map(&self) -> &DetailsMap {
        &self.0
    }

    pub fn into_inner(self) -> DetailsMap {
        self.0
    }
}

/// Checks details payloads against the registry.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    registry: Arc<SchemaRegistry>,
}

impl SchemaValidator {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn validate(
        &self,
        category_id: u32,
        listing_type: ListingType,
        details: DetailsMap,
        mode: ValidationMode,
    ) -> Result<ValidatedDetails, ValidationError> {
        let key = SchemaKey::new(category_id, listing_type);
        let specs = self
            .registry
            .lookup(key)
            .ok_or(ValidationError::SchemaNotFound(key))?;

        let allowed = specs.allowed();
        if let Some(unknown) = details.keys().find(|name| !allowed.contains(name.as_str())) {
            return Err(ValidationError::UnknownField(unknown.clone()));
        }

        if mode == ValidationMode::Create {
            if let Some(missing) = specs
                .required()
                .find(|spec| !details.contains_key(&spec.name))
            {
                return Err(ValidationError::MissingRequiredField(missing.name.clone()));
            }
        }

        for (name, value) in &details {
            // Every key passed the allow-list above.
            let Some(spec) = specs.get(name) else {
                continue;
            };

            if value.is_null() {
                if spec.required {
                    return Err(ValidationError::violation(name, "present", value));
                }
                continue;
            }

            if !spec.rule.accepts(value) {
                return Err(ValidationError::violation(
                    name,
                    spec.rule.to_string(),
                    value,
                ));
            }
        }

        Ok(ValidatedDetails(details))
    }
}
