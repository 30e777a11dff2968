use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form category-specific attributes, constrained by the listing schema.
pub type DetailsMap = Map<String, Value>;

/// Storage-assigned listing identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub u64);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage-assigned image identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmenityId(pub u32);

/// Account that created the listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Subscription the quota gate should charge, when the owner has several.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

/// Human-readable reference shown to buyers and support staff (e.g. `CL-7KX2M9QA`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingReference(pub String);

impl fmt::Display for ListingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Sale,
    Rent,
    ShortTermRent,
}

impl ListingType {
    pub const fn ordered() -> [Self; 3] {
        [Self::Sale, Self::Rent, Self::ShortTermRent]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Rent => "rent",
            Self::ShortTermRent => "short_term_rent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|candidate| candidate.as_str() == value)
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    PendingValidation,
    Published,
    Rejected,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingValidation => "pending_validation",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }

    /// Target state for `event`, or `None` when the edge does not exist.
    pub const fn transition(self, event: ListingEvent) -> Option<Self> {
        match (self, event) {
            (Self::Draft, ListingEvent::Submit) => Some(Self::PendingValidation),
            (Self::PendingValidation, ListingEvent::Approve) => Some(Self::Published),
            (Self::PendingValidation, ListingEvent::Reject) => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Details, amenities and images are frozen outside of `draft`.
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingEvent {
    Submit,
    Approve,
    Reject,
}

impl ListingEvent {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for ListingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classified ad as persisted by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub reference: ListingReference,
    pub owner_id: OwnerId,
    pub category_id: u32,
    pub listing_type: ListingType,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub price_negotiable: bool,
    pub surface: Option<f64>,
    pub city_id: Option<u64>,
    pub district_id: Option<u64>,
    pub address: Option<String>,
    pub status: ListingStatus,
    pub is_published: bool,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The listing aggregate: scalar row, details document, and amenity membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub listing: Listing,
    pub details: DetailsMap,
    pub amenities: BTreeSet<AmenityId>,
}

/// Fully prepared listing handed to the repository for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDraft {
    pub reference: ListingReference,
    pub owner_id: OwnerId,
    pub category_id: u32,
    pub listing_type: ListingType,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub price_negotiable: bool,
    pub surface: Option<f64>,
    pub city_id: Option<u64>,
    pub district_id: Option<u64>,
    pub address: Option<String>,
    pub details: DetailsMap,
    pub amenities: BTreeSet<AmenityId>,
}

/// Client payload for creating a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub category_id: u32,
    pub listing_type: ListingType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub price_negotiable: bool,
    #[serde(default)]
    pub surface: Option<f64>,
    #[serde(default)]
    pub city_id: Option<u64>,
    #[serde(default)]
    pub district_id: Option<u64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub details: DetailsMap,
    #[serde(default)]
    pub amenities: Option<Vec<AmenityId>>,
}

/// Partial update. Every key outside `details`/`amenities` targets a scalar attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<AmenityPatch>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmenityPatch {
    #[serde(default)]
    pub add: Vec<AmenityId>,
    #[serde(default)]
    pub remove: Vec<AmenityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOutcome {
    pub changed: bool,
    pub listing: ListingRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingImage {
    pub id: ImageId,
    pub listing_id: ListingId,
    pub path: String,
    pub position: u32,
    pub original_name: String,
}

/// Stored file awaiting its image row. The repository assigns id and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewListingImage {
    pub path: String,
    pub original_name: String,
}

/// Raw uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
