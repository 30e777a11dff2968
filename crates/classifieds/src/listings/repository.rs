use std::collections::BTreeSet;

use serde::Serialize;

use super::domain::{
    AmenityId, DetailsMap, ImageId, ImageUpload, Listing, ListingDraft, ListingId, ListingImage,
    ListingRecord, ListingReference, ListingStatus, NewListingImage, OwnerId, SubscriptionId,
};
use super::fields::FieldValue;

/// Writes produced by one `update` call. Applied atomically or not at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingChangeSet {
    pub fields: Vec<FieldValue>,
    pub details: Option<DetailsMap>,
    pub attach: BTreeSet<AmenityId>,
    pub detach: BTreeSet<AmenityId>,
}

impl ListingChangeSet {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
            && self.details.is_none()
            && self.attach.is_empty()
            && self.detach.is_empty()
    }

    /// Apply every channel to an in-memory aggregate.
    pub fn apply_to(self, record: &mut ListingRecord) {
        for value in self.fields {
            value.apply(&mut record.listing);
        }
        if let Some(details) = self.details {
            record.details = details;
        }
        record.amenities.extend(self.attach);
        record
            .amenities
            .retain(|amenity| !self.detach.contains(amenity));
    }
}

/// Moderation columns written by a state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleUpdate {
    pub status: ListingStatus,
    pub is_published: bool,
    pub rejection_reason: Option<String>,
}

impl LifecycleUpdate {
    pub fn apply_to(self, listing: &mut Listing) {
        listing.status = self.status;
        listing.is_published = self.is_published;
        listing.rejection_reason = self.rejection_reason;
    }
}

/// Storage abstraction for the listing aggregate. Every method is one atomic unit.
pub trait ListingRepository: Send + Sync {
    fn insert(&self, draft: ListingDraft) -> Result<ListingRecord, RepositoryError>;
    fn fetch(&self, id: ListingId) -> Result<Option<ListingRecord>, RepositoryError>;
    fn reference_exists(&self, reference: &ListingReference) -> Result<bool, RepositoryError>;
    fn apply_changes(&self, id: ListingId, changes: ListingChangeSet)
        -> Result<(), RepositoryError>;
    fn update_lifecycle(&self, id: ListingId, update: LifecycleUpdate)
        -> Result<(), RepositoryError>;

    /// Images of a listing ordered by position.
    fn images(&self, id: ListingId) -> Result<Vec<ListingImage>, RepositoryError>;
    fn fetch_image(&self, id: ImageId) -> Result<Option<ListingImage>, RepositoryError>;
    /// Append `images` in order at positions `max + 1..`, reading the current maximum inside
    /// the same atomic unit as the insert.
    fn insert_images(
        &self,
        id: ListingId,
        images: Vec<NewListingImage>,
    ) -> Result<Vec<ListingImage>, RepositoryError>;
    fn delete_image(&self, id: ImageId) -> Result<(), RepositoryError>;
    /// Assign positions; images that do not belong to `id` are left untouched.
    fn reorder_images(
        &self,
        id: ListingId,
        positions: Vec<(ImageId, u32)>,
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Subscription authority consulted before quota-consuming actions.
pub trait QuotaGate: Send + Sync {
    fn can_add_images(&self, listing: &Listing, count: usize) -> Result<bool, QuotaError>;
    fn consume_listing_slot(
        &self,
        owner: &OwnerId,
        subscription: Option<&SubscriptionId>,
        amount: u32,
    ) -> Result<(), QuotaError>;
    /// Return slots taken by `consume_listing_slot` when the guarded write did not happen.
    fn release_listing_slot(
        &self,
        owner: &OwnerId,
        subscription: Option<&SubscriptionId>,
        amount: u32,
    ) -> Result<(), QuotaError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("no listing slots left for owner {owner}")]
    ListingSlotsExhausted { owner: OwnerId },
    #[error("listing {listing_id} cannot take {requested} more image(s)")]
    ImageCapacity { listing_id: ListingId, requested: usize },
    #[error("quota service unavailable: {0}")]
    Unavailable(String),
}

/// Binary storage for uploaded images.
pub trait FileStore: Send + Sync {
    fn store(&self, listing_id: ListingId, upload: &ImageUpload) -> Result<String, FileStoreError>;
    fn delete(&self, path: &str) -> Result<(), FileStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("stored file not found: {0}")]
    NotFound(String),
    #[error("file storage failed: {0}")]
    Backend(String),
}
