//! Schema-driven validation and moderation lifecycle for classified listings.
//!
//! Details payloads are checked against the [`schema::SchemaRegistry`], partial updates are
//! merged and diffed so that unchanged channels are never written, and listings move through
//! `draft -> pending_validation -> published | rejected`. Storage, quota accounting and file
//! storage are collaborators expressed as traits in [`repository`].

pub mod domain;
pub mod fields;
pub mod images;
pub mod lifecycle;
pub mod memory;
pub mod patch;
pub mod repository;
pub mod router;
pub mod schema;

#[cfg(test)]
mod tests;

pub use domain::{
    AmenityId, AmenityPatch, DetailsMap, ImageId, ImageUpload, Listing, ListingEvent, ListingId,
    ListingImage, ListingPatch, ListingRecord, ListingReference, ListingStatus, ListingType,
    NewListing, OwnerId, SubscriptionId, UpdateOutcome,
};
pub use images::ImageCollectionService;
pub use lifecycle::{ListingLifecycleService, ListingServiceError};
pub use memory::{InMemoryFileStore, InMemoryListingStore, InMemoryQuotaGate};
pub use repository::{
    FileStore, FileStoreError, ListingRepository, QuotaError, QuotaGate, RepositoryError,
};
pub use router::{listing_router, ListingServices};
pub use schema::{
    FieldSpec, FieldSpecSet, RegistryError, SchemaKey, SchemaRegistry, SchemaValidator,
    ValidatedDetails, ValidationError, ValidationMode, ValidationRule,
};
