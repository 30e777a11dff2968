//! In-process collaborators used by the demo binary and the test suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    ImageId, ImageUpload, Listing, ListingDraft, ListingId, ListingImage, ListingRecord,
    ListingReference, ListingStatus, NewListingImage, OwnerId, SubscriptionId,
};
use super::repository::{
    FileStore, FileStoreError, LifecycleUpdate, ListingChangeSet, ListingRepository, QuotaError,
    QuotaGate, RepositoryError,
};

#[derive(Debug, Default)]
struct StoreState {
    next_listing_id: u64,
    next_image_id: u64,
    listings: BTreeMap<ListingId, ListingRecord>,
    images: BTreeMap<ImageId, ListingImage>,
    commits: usize,
    unavailable: bool,
}

impl StoreState {
    fn writable(&self) -> Result<(), RepositoryError> {
        if self.unavailable {
            Err(RepositoryError::Unavailable("store is read only".to_string()))
        } else {
            Ok(())
        }
    }

    fn record_mut(&mut self, id: ListingId) -> Result<&mut ListingRecord, RepositoryError> {
        self.listings.get_mut(&id).ok_or(RepositoryError::NotFound)
    }
}

/// Mutex-guarded aggregate store; each trait call is applied all-or-nothing.
#[derive(Debug, Default, Clone)]
pub struct InMemoryListingStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful write calls so far.
    pub fn commits(&self) -> usize {
        self.lock().commits
    }

    /// Make every subsequent write fail with `RepositoryError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub fn image_count(&self, id: ListingId) -> usize {
        self.lock()
            .images
            .values()
            .filter(|image| image.listing_id == id)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("listing store mutex poisoned")
    }
}

impl ListingRepository for InMemoryListingStore {
    fn insert(&self, draft: ListingDraft) -> Result<ListingRecord, RepositoryError> {
        let mut state = self.lock();
        state.writable()?;
        if state
            .listings
            .values()
            .any(|record| record.listing.reference == draft.reference)
        {
            return Err(RepositoryError::Conflict);
        }

        state.next_listing_id += 1;
        let id = ListingId(state.next_listing_id);
        let now = Utc::now();
        let record = ListingRecord {
            listing: Listing {
                id,
                reference: draft.reference,
                owner_id: draft.owner_id,
                category_id: draft.category_id,
                listing_type: draft.listing_type,
                title: draft.title,
                description: draft.description,
                price: draft.price,
                currency: draft.currency,
                price_negotiable: draft.price_negotiable,
                surface: draft.surface,
                city_id: draft.city_id,
                district_id: draft.district_id,
                address: draft.address,
                status: ListingStatus::Draft,
                is_published: false,
                rejection_reason: None,
                created_at: now,
                updated_at: now,
            },
            details: draft.details,
            amenities: draft.amenities,
        };

        state.listings.insert(id, record.clone());
        state.commits += 1;
        Ok(record)
    }

    fn fetch(&self, id: ListingId) -> Result<Option<ListingRecord>, RepositoryError> {
        Ok(self.lock().listings.get(&id).cloned())
    }

    fn reference_exists(&self, reference: &ListingReference) -> Result<bool, RepositoryError> {
        Ok(self
            .lock()
            .listings
            .values()
            .any(|record| &record.listing.reference == reference))
    }

    fn apply_changes(
        &self,
        id: ListingId,
        changes: ListingChangeSet,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        state.writable()?;
        let record = state.record_mut(id)?;
        changes.apply_to(record);
        record.listing.updated_at = Utc::now();
        state.commits += 1;
        Ok(())
    }

    fn update_lifecycle(
        &self,
        id: ListingId,
        update: LifecycleUpdate,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        state.writable()?;
        let record = state.record_mut(id)?;
        update.apply_to(&mut record.listing);
        record.listing.updated_at = Utc::now();
        state.commits += 1;
        Ok(())
    }

    fn images(&self, id: ListingId) -> Result<Vec<ListingImage>, RepositoryError> {
        let state = self.lock();
        let mut images: Vec<_> = state
            .images
            .values()
            .filter(|image| image.listing_id == id)
            .cloned()
            .collect();
        images.sort_by_key(|image| (image.position, image.id));
        Ok(images)
    }

    fn fetch_image(&self, id: ImageId) -> Result<Option<ListingImage>, RepositoryError> {
        Ok(self.lock().images.get(&id).cloned())
    }

    fn insert_images(
        &self,
        id: ListingId,
        images: Vec<NewListingImage>,
    ) -> Result<Vec<ListingImage>, RepositoryError> {
        let mut state = self.lock();
        state.writable()?;
        if !state.listings.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }

        let last_position = state
            .images
            .values()
            .filter(|image| image.listing_id == id)
            .map(|image| image.position)
            .max()
            .unwrap_or(0);

        let mut inserted = Vec::with_capacity(images.len());
        for (offset, image) in (1..).zip(images) {
            state.next_image_id += 1;
            let image = ListingImage {
                id: ImageId(state.next_image_id),
                listing_id: id,
                path: image.path,
                position: last_position + offset,
                original_name: image.original_name,
            };
            state.images.insert(image.id, image.clone());
            inserted.push(image);
        }
        state.commits += 1;
        Ok(inserted)
    }

    fn delete_image(&self, id: ImageId) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        state.writable()?;
        state.images.remove(&id).ok_or(RepositoryError::NotFound)?;
        state.commits += 1;
        Ok(())
    }

    fn reorder_images(
        &self,
        id: ListingId,
        positions: Vec<(ImageId, u32)>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        state.writable()?;
        for (image_id, position) in positions {
            if let Some(image) = state
                .images
                .get_mut(&image_id)
                .filter(|image| image.listing_id == id)
            {
                image.position = position;
            }
        }
        state.commits += 1;
        Ok(())
    }
}

/// Fixed per-listing image cap and per-owner listing slot allowance.
#[derive(Debug, Clone)]
pub struct InMemoryQuotaGate {
    store: InMemoryListingStore,
    max_images_per_listing: usize,
    slots_per_owner: u32,
    consumed: Arc<Mutex<HashMap<OwnerId, u32>>>,
}

impl InMemoryQuotaGate {
    pub fn new(
        store: InMemoryListingStore,
        max_images_per_listing: usize,
        slots_per_owner: u32,
    ) -> Self {
        Self {
            store,
            max_images_per_listing,
            slots_per_owner,
            consumed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn consumed_slots(&self, owner: &OwnerId) -> u32 {
        self.consumed
            .lock()
            .expect("quota mutex poisoned")
            .get(owner)
            .copied()
            .unwrap_or(0)
    }
}

impl QuotaGate for InMemoryQuotaGate {
    fn can_add_images(&self, listing: &Listing, count: usize) -> Result<bool, QuotaError> {
        let current = self.store.image_count(listing.id);
        Ok(current + count <= self.max_images_per_listing)
    }

    fn consume_listing_slot(
        &self,
        owner: &OwnerId,
        _subscription: Option<&SubscriptionId>,
        amount: u32,
    ) -> Result<(), QuotaError> {
        let mut consumed = self.consumed.lock().expect("quota mutex poisoned");
        let used = consumed.entry(owner.clone()).or_insert(0);
        if *used + amount > self.slots_per_owner {
            return Err(QuotaError::ListingSlotsExhausted {
                owner: owner.clone(),
            });
        }
        *used += amount;
        Ok(())
    }

    fn release_listing_slot(
        &self,
        owner: &OwnerId,
        _subscription: Option<&SubscriptionId>,
        amount: u32,
    ) -> Result<(), QuotaError> {
        let mut consumed = self.consumed.lock().expect("quota mutex poisoned");
        if let Some(used) = consumed.get_mut(owner) {
            *used = used.saturating_sub(amount);
        }
        Ok(())
    }
}

/// Keeps uploaded bytes in memory under generated paths.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFileStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files
            .lock()
            .expect("file store mutex poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files
            .lock()
            .expect("file store mutex poisoned")
            .contains_key(path)
    }
}

impl FileStore for InMemoryFileStore {
    fn store(&self, listing_id: ListingId, upload: &ImageUpload) -> Result<String, FileStoreError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let extension = upload
            .file_name
            .rsplit_once('.')
            .map(|(_, extension)| extension.to_ascii_lowercase())
            .filter(|extension| !extension.is_empty())
            .unwrap_or_else(|| "bin".to_string());
        let path = format!("listings/{listing_id}/{sequence:06}.{extension}");

        self.files
            .lock()
            .expect("file store mutex poisoned")
            .insert(path.clone(), upload.bytes.clone());
        Ok(path)
    }

    fn delete(&self, path: &str) -> Result<(), FileStoreError> {
        self.files
            .lock()
            .expect("file store mutex poisoned")
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| FileStoreError::NotFound(path.to_string()))
    }
}
