//! Declarative registry of the details fields each category accepts.
//!
//! Schemas are keyed by `(category_id, listing_type)` and loaded from a JSON document once at
//! startup. The registry is never mutated afterwards; services share it through an `Arc`.

mod rules;
mod validator;

pub use rules::ValidationRule;
pub use validator::{SchemaValidator, ValidatedDetails, ValidationError, ValidationMode};

pub(crate) use rules::{boolean_value, integer_value, numeric_value};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::domain::ListingType;

const BUNDLED_SCHEMAS: &str = include_str!("../../../schemas/listing_schemas.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaKey {
    pub category_id: u32,
    pub listing_type: ListingType,
}

impl SchemaKey {
    pub const fn new(category_id: u32, listing_type: ListingType) -> Self {
        Self {
            category_id,
            listing_type,
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "category {} / {}", self.category_id, self.listing_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub rule: ValidationRule,
    #[serde(default)]
    pub required: bool,
}

/// Fields declared for one schema key, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpecSet {
    fields: Vec<FieldSpec>,
}

impl FieldSpecSet {
    fn new(key: SchemaKey, fields: Vec<FieldSpec>) -> Result<Self, RegistryError> {
        let mut seen = BTreeSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(RegistryError::DuplicateField {
                    key,
                    field: field.name.clone(),
                });
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn required(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| field.required)
    }

    pub fn optional(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|field| !field.required)
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Union of required and optional names.
    pub fn allowed(&self) -> BTreeSet<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    categories: Vec<CategoryDefinition>,
    schemas: Vec<SchemaDocument>,
}

#[derive(Debug, Deserialize)]
struct SchemaDocument {
    category_id: u32,
    listing_type: ListingType,
    fields: Vec<FieldSpec>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unable to read schema document {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed schema document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("schema for {0} is declared more than once")]
    DuplicateSchema(SchemaKey),
    #[error("field '{field}' is declared more than once for {key}")]
    DuplicateField { key: SchemaKey, field: String },
}

/// Immutable `(category_id, listing_type) -> FieldSpecSet` table.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    categories: BTreeMap<u32, String>,
    schemas: HashMap<SchemaKey, FieldSpecSet>,
}

impl SchemaRegistry {
    /// Registry shipped with the crate.
    pub fn bundled() -> Result<Self, RegistryError> {
        Self::from_json(BUNDLED_SCHEMAS)
    }

    /// Process-wide registry built from the bundled schemas on first use.
    pub fn standard() -> Result<&'static SchemaRegistry, RegistryError> {
        static STANDARD: OnceLock<SchemaRegistry> = OnceLock::new();
        if let Some(registry) = STANDARD.get() {
            return Ok(registry);
        }
        let registry = Self::bundled()?;
        Ok(STANDARD.get_or_init(|| registry))
    }

    /// Copy of the standard registry unless an override document is configured.
    pub fn load(path: Option<&Path>) -> Result<Self, RegistryError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::standard().cloned(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let document: RegistryDocument = serde_json::from_str(raw)?;

        let mut schemas = HashMap::with_capacity(document.schemas.len());
        for schema in document.schemas {
            let key = SchemaKey::new(schema.category_id, schema.listing_type);
            let set = FieldSpecSet::new(key, schema.fields)?;
            if schemas.insert(key, set).is_some() {
                return Err(RegistryError::DuplicateSchema(key));
            }
        }

        let categories = document
            .categories
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect();

        Ok(Self {
            categories,
            schemas,
        })
    }

    pub fn lookup(&self, key: SchemaKey) -> Option<&FieldSpecSet> {
        self.schemas.get(&key)
    }

    /// Every registered key, sorted by category then listing type.
    pub fn keys(&self) -> Vec<SchemaKey> {
        let mut keys: Vec<_> = self.schemas.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn category_name(&self, category_id: u32) -> Option<&str> {
        self.categories.get(&category_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
