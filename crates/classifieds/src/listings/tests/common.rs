use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::{json, Value};

use crate::listings::domain::{
    AmenityId, DetailsMap, ImageUpload, ListingId, ListingRecord, ListingType, NewListing,
    OwnerId,
};
use crate::listings::memory::{InMemoryFileStore, InMemoryListingStore, InMemoryQuotaGate};
use crate::listings::repository::{FileStore, FileStoreError};
use crate::listings::{
    listing_router, ImageCollectionService, ListingLifecycleService, ListingServices,
    SchemaRegistry,
};

pub(super) const MAX_IMAGES: usize = 4;
pub(super) const SLOTS: u32 = 2;

pub(super) fn registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::bundled().expect("bundled schemas are valid"))
}

pub(super) fn owner() -> OwnerId {
    OwnerId("owner-17".to_string())
}

pub(super) fn details(value: Value) -> DetailsMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub(super) fn house_sale() -> NewListing {
    NewListing {
        category_id: 1,
        listing_type: ListingType::Sale,
        title: "Family house with garden".to_string(),
        description: Some("Quiet street, close to schools.".to_string()),
        price: 1_250_000.0,
        currency: "MAD".to_string(),
        price_negotiable: true,
        surface: Some(240.0),
        city_id: Some(4),
        district_id: Some(41),
        address: Some("12 Rue des Orangers".to_string()),
        details: details(json!({
            "bedrooms": 3,
            "bathrooms": 2,
            "kitchens": 1,
            "has_pool": false
        })),
        amenities: Some(vec![AmenityId(1), AmenityId(2)]),
    }
}

pub(super) fn upload(name: &str) -> ImageUpload {
    ImageUpload {
        file_name: name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
    }
}

pub(super) struct Harness<F = InMemoryFileStore> {
    pub(super) store: Arc<InMemoryListingStore>,
    pub(super) quota: Arc<InMemoryQuotaGate>,
    pub(super) files: Arc<F>,
    pub(super) lifecycle: ListingLifecycleService<InMemoryListingStore, InMemoryQuotaGate>,
    pub(super) images: ImageCollectionService<InMemoryListingStore, InMemoryQuotaGate, F>,
}

impl<F: FileStore + 'static> Harness<F> {
    pub(super) fn with_files(files: F) -> Self {
        let store = Arc::new(InMemoryListingStore::new());
        let quota = Arc::new(InMemoryQuotaGate::new(
            store.as_ref().clone(),
            MAX_IMAGES,
            SLOTS,
        ));
        let files = Arc::new(files);
        Self {
            lifecycle: ListingLifecycleService::new(registry(), store.clone(), quota.clone()),
            images: ImageCollectionService::new(store.clone(), quota.clone(), files.clone()),
            store,
            quota,
            files,
        }
    }

    pub(super) fn draft(&self) -> ListingRecord {
        self.lifecycle
            .create(house_sale(), owner())
            .expect("draft listing created")
    }

    pub(super) fn pending(&self) -> ListingRecord {
        let record = self.draft();
        self.lifecycle
            .submit(record.listing.id, None)
            .expect("listing submitted")
    }

    pub(super) fn published(&self) -> ListingRecord {
        let record = self.pending();
        self.lifecycle
            .approve(record.listing.id)
            .expect("listing approved")
    }
}

impl Harness<InMemoryFileStore> {
    pub(super) fn new() -> Self {
        Self::with_files(InMemoryFileStore::new())
    }
}

/// Stores up to `limit` files, then fails every further store call.
#[derive(Debug, Default)]
pub(super) struct FlakyFileStore {
    inner: InMemoryFileStore,
    limit: usize,
    stored: AtomicUsize,
}

impl FlakyFileStore {
    pub(super) fn failing_after(limit: usize) -> Self {
        Self {
            inner: InMemoryFileStore::new(),
            limit,
            stored: AtomicUsize::new(0),
        }
    }

    pub(super) fn paths(&self) -> Vec<String> {
        self.inner.paths()
    }
}

impl FileStore for FlakyFileStore {
    fn store(&self, listing_id: ListingId, upload: &ImageUpload) -> Result<String, FileStoreError> {
        if self.stored.fetch_add(1, Ordering::SeqCst) >= self.limit {
            return Err(FileStoreError::Backend("disk full".to_string()));
        }
        self.inner.store(listing_id, upload)
    }

    fn delete(&self, path: &str) -> Result<(), FileStoreError> {
        self.inner.delete(path)
    }
}

pub(super) fn router(harness: Harness) -> axum::Router {
    let Harness {
        lifecycle, images, ..
    } = harness;
    listing_router(Arc::new(ListingServices { lifecycle, images }))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
