use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{ImageId, ImageUpload, ListingId, ListingImage, ListingRecord, NewListingImage};
use super::lifecycle::{ensure_editable, ListingServiceError};
use super::repository::{FileStore, ListingRepository, QuotaError, QuotaGate, RepositoryError};

/// Maintains the ordered image gallery of draft listings.
pub struct ImageCollectionService<R, Q, F> {
    repository: Arc<R>,
    quota: Arc<Q>,
    files: Arc<F>,
}

impl<R, Q, F> ImageCollectionService<R, Q, F>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    pub fn new(repository: Arc<R>, quota: Arc<Q>, files: Arc<F>) -> Self {
        Self {
            repository,
            quota,
            files,
        }
    }

    pub fn list_images(&self, listing_id: ListingId) -> Result<Vec<ListingImage>, ListingServiceError> {
        self.load(listing_id)?;
        Ok(self.repository.images(listing_id)?)
    }

    /// Store `uploads` and append them after the current last position.
    pub fn add_images(
        &self,
        listing_id: ListingId,
        uploads: Vec<ImageUpload>,
    ) -> Result<Vec<ListingImage>, ListingServiceError> {
        let record = self.load(listing_id)?;
        ensure_editable(&record.listing)?;

        if uploads.is_empty() {
            return Ok(Vec::new());
        }

        let allowed = self
            .quota
            .can_add_images(&record.listing, uploads.len())
            .map_err(ListingServiceError::QuotaExceeded)?;
        if !allowed {
            return Err(ListingServiceError::QuotaExceeded(QuotaError::ImageCapacity {
                listing_id,
                requested: uploads.len(),
            }));
        }

        let mut pending = Vec::with_capacity(uploads.len());
        for upload in &uploads {
            match self.files.store(listing_id, upload) {
                Ok(path) => pending.push(NewListingImage {
                    path,
                    original_name: upload.file_name.clone(),
                }),
                Err(err) => {
                    self.discard(&pending);
                    return Err(err.into());
                }
            }
        }

        match self.repository.insert_images(listing_id, pending.clone()) {
            Ok(images) => {
                info!(listing_id = %listing_id, count = images.len(), "listing images added");
                Ok(images)
            }
            Err(err) => {
                self.discard(&pending);
                Err(err.into())
            }
        }
    }

    /// Remove one image and its stored file. Remaining positions are left as they are.
    pub fn delete_image(&self, image_id: ImageId) -> Result<(), ListingServiceError> {
        let image = self
            .repository
            .fetch_image(image_id)?
            .ok_or(RepositoryError::NotFound)?;
        let record = self.load(image.listing_id)?;
        ensure_editable(&record.listing)?;

        self.repository.delete_image(image_id)?;
        if let Err(err) = self.files.delete(&image.path) {
            warn!(image_id = %image_id, path = %image.path, error = %err, "stored image file was not removed");
        }

        info!(listing_id = %image.listing_id, image_id = %image_id, "listing image deleted");
        Ok(())
    }

    /// Position each id at its index in `ordered_ids` (1-based). Ids that belong to another
    /// listing are skipped.
    pub fn reorder_images(
        &self,
        listing_id: ListingId,
        ordered_ids: &[ImageId],
    ) -> Result<Vec<ListingImage>, ListingServiceError> {
        let record = self.load(listing_id)?;
        ensure_editable(&record.listing)?;

        let owned: HashSet<ImageId> = self
            .repository
            .images(listing_id)?
            .into_iter()
            .map(|image| image.id)
            .collect();

        let positions: Vec<(ImageId, u32)> = ordered_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| owned.contains(*id))
            .map(|(index, id)| (*id, index as u32 + 1))
            .collect();

        if !positions.is_empty() {
            self.repository.reorder_images(listing_id, positions)?;
        }

        Ok(self.repository.images(listing_id)?)
    }

    fn load(&self, listing_id: ListingId) -> Result<ListingRecord, ListingServiceError> {
        let record = self
            .repository
            .fetch(listing_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    fn discard(&self, pending: &[NewListingImage]) {
        for image in pending {
            if let Err(err) = self.files.delete(&image.path) {
                warn!(path = %image.path, error = %err, "failed to discard stored image");
            }
        }
    }
}
