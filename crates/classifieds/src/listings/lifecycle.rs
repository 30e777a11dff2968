use std::collections::BTreeSet;
use std::sync::Arc;

use rand::Rng;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::domain::{
    AmenityPatch, Listing, ListingDraft, ListingEvent, ListingId, ListingPatch, ListingRecord,
    ListingReference, ListingStatus, NewListing, OwnerId, SubscriptionId, UpdateOutcome,
};
use super::fields::{self, FieldValue, ScalarField};
use super::patch::{merge_details, same_details};
use super::repository::{
    FileStoreError, LifecycleUpdate, ListingChangeSet, ListingRepository, QuotaError, QuotaGate,
    RepositoryError,
};
use super::schema::{SchemaRegistry, SchemaValidator, ValidationError, ValidationMode};

const REFERENCE_PREFIX: &str = "CL-";
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const REFERENCE_LENGTH: usize = 8;
const REFERENCE_ATTEMPTS: usize = 5;

fn generate_reference() -> ListingReference {
    let mut rng = rand::rng();
    let code: String = (0..REFERENCE_LENGTH)
        .map(|_| REFERENCE_ALPHABET[rng.random_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    ListingReference(format!("{REFERENCE_PREFIX}{code}"))
}

/// Orchestrates creation, patching and moderation of listings.
pub struct ListingLifecycleService<R, Q> {
    validator: SchemaValidator,
    repository: Arc<R>,
    quota: Arc<Q>,
}

impl<R, Q> ListingLifecycleService<R, Q>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
{
    pub fn new(registry: Arc<SchemaRegistry>, repository: Arc<R>, quota: Arc<Q>) -> Self {
        Self {
            validator: SchemaValidator::new(registry),
            repository,
            quota,
        }
    }

    /// Validate and persist a new draft listing together with its details and amenities.
    pub fn create(
        &self,
        payload: NewListing,
        owner: OwnerId,
    ) -> Result<ListingRecord, ListingServiceError> {
        fields::check_new_listing(&payload)?;

        let NewListing {
            category_id,
            listing_type,
            title,
            description,
            price,
            currency,
            price_negotiable,
            surface,
            city_id,
            district_id,
            address,
            details,
            amenities,
        } = payload;

        let details = self.validator.validate(
            category_id,
            listing_type,
            details,
            ValidationMode::Create,
        )?;
        let reference = self.allocate_reference()?;

        let record = self.repository.insert(ListingDraft {
            reference,
            owner_id: owner,
            category_id,
            listing_type,
            title,
            description,
            price,
            currency,
            price_negotiable,
            surface,
            city_id,
            district_id,
            address,
            details: details.into_inner(),
            amenities: amenities.unwrap_or_default().into_iter().collect(),
        })?;

        info!(
            listing_id = %record.listing.id,
            reference = %record.listing.reference,
            owner = %record.listing.owner_id,
            "listing draft created"
        );
        Ok(record)
    }

    pub fn get(&self, id: ListingId) -> Result<ListingRecord, ListingServiceError> {
        let record = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Apply a partial update. Scalar fields, details and amenities are diffed independently
    /// and only the channels that actually change are written, in a single repository call.
    pub fn update(
        &self,
        id: ListingId,
        patch: ListingPatch,
    ) -> Result<UpdateOutcome, ListingServiceError> {
        let current = self.get(id)?;
        ensure_editable(&current.listing)?;

        let ListingPatch {
            details,
            amenities,
            fields,
        } = patch;

        let mut changes = ListingChangeSet {
            fields: self.scalar_changes(&current.listing, &fields)?,
            ..ListingChangeSet::default()
        };

        if let Some(details) = details {
            changes.details = self.details_change(&current, details)?;
        }

        if let Some(AmenityPatch { add, remove }) = amenities {
            changes.attach = add
                .into_iter()
                .filter(|amenity| !current.amenities.contains(amenity))
                .collect();
            changes.detach = remove
                .into_iter()
                .filter(|amenity| current.amenities.contains(amenity))
                .collect::<BTreeSet<_>>();
        }

        if changes.is_empty() {
            debug!(listing_id = %id, "update produced no changes");
            return Ok(UpdateOutcome {
                changed: false,
                listing: self.get(id)?,
            });
        }

        debug!(
            listing_id = %id,
            fields = changes.fields.len(),
            details = changes.details.is_some(),
            attached = changes.attach.len(),
            detached = changes.detach.len(),
            "applying listing update"
        );
        self.repository.apply_changes(id, changes)?;

        Ok(UpdateOutcome {
            changed: true,
            listing: self.get(id)?,
        })
    }

    /// Move a draft into the moderation queue, consuming one listing slot.
    pub fn submit(
        &self,
        id: ListingId,
        subscription: Option<&SubscriptionId>,
    ) -> Result<ListingRecord, ListingServiceError> {
        let record = self.get(id)?;
        let status = next_status(&record.listing, ListingEvent::Submit)?;

        let owner = &record.listing.owner_id;
        self.quota
            .consume_listing_slot(owner, subscription, 1)
            .map_err(ListingServiceError::QuotaExceeded)?;

        let update = LifecycleUpdate {
            status,
            is_published: false,
            rejection_reason: record.listing.rejection_reason.clone(),
        };
        if let Err(err) = self.repository.update_lifecycle(id, update) {
            if let Err(release_err) = self.quota.release_listing_slot(owner, subscription, 1) {
                warn!(listing_id = %id, error = %release_err, "listing slot not released");
            }
            return Err(err.into());
        }

        info!(listing_id = %id, "listing submitted for validation");
        self.get(id)
    }

    pub fn approve(&self, id: ListingId) -> Result<ListingRecord, ListingServiceError> {
        let record = self.get(id)?;
        let status = next_status(&record.listing, ListingEvent::Approve)?;

        self.repository.update_lifecycle(
            id,
            LifecycleUpdate {
                status,
                is_published: true,
                rejection_reason: None,
            },
        )?;

        info!(listing_id = %id, "listing approved and published");
        self.get(id)
    }

    pub fn reject(&self, id: ListingId, reason: &str) -> Result<ListingRecord, ListingServiceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::violation(
                "rejection_reason",
                "non-empty string",
                &Value::String(reason.to_string()),
            )
            .into());
        }

        let record = self.get(id)?;
        let status = next_status(&record.listing, ListingEvent::Reject)?;

        self.repository.update_lifecycle(
            id,
            LifecycleUpdate {
                status,
                is_published: false,
                rejection_reason: Some(reason.to_string()),
            },
        )?;

        info!(listing_id = %id, reason, "listing rejected");
        self.get(id)
    }

    fn scalar_changes(
        &self,
        listing: &Listing,
        raw_fields: &serde_json::Map<String, Value>,
    ) -> Result<Vec<FieldValue>, ValidationError> {
        let mut changes = Vec::new();
        for (key, raw) in raw_fields {
            match fields::immutable_key_unchanged(key, raw, listing) {
                Some(true) => continue,
                Some(false) => return Err(ValidationError::ImmutableField(key.clone())),
                None => {}
            }

            let field = ScalarField::from_key(key)
                .ok_or_else(|| ValidationError::UnknownField(key.clone()))?;
            let incoming = FieldValue::parse(field, raw)?;
            if incoming.differs_from(&FieldValue::read(field, listing)) {
                changes.push(incoming);
            }
        }
        Ok(changes)
    }

    fn details_change(
        &self,
        current: &ListingRecord,
        details: Value,
    ) -> Result<Option<serde_json::Map<String, Value>>, ValidationError> {
        let Value::Object(patch) = details else {
            return Err(ValidationError::violation("details", "object", &details));
        };

        let merged = merge_details(&current.details, patch);
        let validated = self.validator.validate(
            current.listing.category_id,
            current.listing.listing_type,
            merged,
            ValidationMode::Update,
        )?;

        if same_details(validated.as_map(), &current.details) {
            Ok(None)
        } else {
            Ok(Some(validated.into_inner()))
        }
    }

    fn allocate_reference(&self) -> Result<ListingReference, ListingServiceError> {
        for _ in 0..REFERENCE_ATTEMPTS {
            let candidate = generate_reference();
            if !self.repository.reference_exists(&candidate)? {
                return Ok(candidate);
            }
        }
        Err(RepositoryError::Conflict.into())
    }
}

fn next_status(listing: &Listing, event: ListingEvent) -> Result<ListingStatus, ListingServiceError> {
    listing
        .status
        .transition(event)
        .ok_or(ListingServiceError::InvalidTransition {
            from: listing.status,
            event,
        })
}

pub(crate) fn ensure_editable(listing: &Listing) -> Result<(), ListingServiceError> {
    if listing.status.is_editable() {
        Ok(())
    } else {
        Err(ListingServiceError::InvalidState {
            listing_id: listing.id,
            status: listing.status,
        })
    }
}

/// Error raised by the listing and image services.
#[derive(Debug, thiserror::Error)]
pub enum ListingServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot {event} a listing in status {from}")]
    InvalidTransition {
        from: ListingStatus,
        event: ListingEvent,
    },
    #[error("listing {listing_id} is {status} and can no longer be edited")]
    InvalidState {
        listing_id: ListingId,
        status: ListingStatus,
    },
    #[error(transparent)]
    QuotaExceeded(QuotaError),
    #[error(transparent)]
    Storage(#[from] RepositoryError),
    #[error(transparent)]
    FileStore(#[from] FileStoreError),
}

impl ListingServiceError {
    /// Stable machine-readable discriminator for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ListingServiceError::Validation(ValidationError::SchemaNotFound(_)) => {
                "schema_not_found"
            }
            ListingServiceError::Validation(ValidationError::UnknownField(_)) => "unknown_field",
            ListingServiceError::Validation(ValidationError::MissingRequiredField(_)) => {
                "missing_required_field"
            }
            ListingServiceError::Validation(ValidationError::RuleViolation { .. }) => {
                "rule_violation"
            }
            ListingServiceError::Validation(ValidationError::ImmutableField(_)) => {
                "immutable_field"
            }
            ListingServiceError::InvalidTransition { .. } => "invalid_transition",
            ListingServiceError::InvalidState { .. } => "invalid_state",
            ListingServiceError::QuotaExceeded(_) => "quota_exceeded",
            ListingServiceError::Storage(RepositoryError::NotFound) => "not_found",
            ListingServiceError::Storage(_) | ListingServiceError::FileStore(_) => {
                "storage_failure"
            }
        }
    }
}
