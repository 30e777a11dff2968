use classifieds::config::ListingsConfig;
use classifieds::error::AppError;
use classifieds::listings::{
    ImageCollectionService, ImageUpload, InMemoryFileStore, InMemoryListingStore,
    InMemoryQuotaGate, ListingLifecycleService, ListingServices, SchemaRegistry,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type InMemoryServices =
    ListingServices<InMemoryListingStore, InMemoryQuotaGate, InMemoryFileStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) registry: Arc<SchemaRegistry>,
}

/// Services and the collaborators behind them, kept so callers can inspect storage.
pub(crate) struct Backend {
    pub(crate) registry: Arc<SchemaRegistry>,
    pub(crate) store: Arc<InMemoryListingStore>,
    pub(crate) files: Arc<InMemoryFileStore>,
    pub(crate) services: Arc<InMemoryServices>,
}

pub(crate) fn load_registry(config: &ListingsConfig) -> Result<Arc<SchemaRegistry>, AppError> {
    let registry = SchemaRegistry::load(config.schema_path.as_deref())?;
    Ok(Arc::new(registry))
}

pub(crate) fn in_memory_backend(config: &ListingsConfig) -> Result<Backend, AppError> {
    let registry = load_registry(config)?;
    let store = InMemoryListingStore::new();
    let quota = Arc::new(InMemoryQuotaGate::new(
        store.clone(),
        config.max_images_per_listing as usize,
        config.listing_slots_per_owner,
    ));
    let store = Arc::new(store);
    let files = Arc::new(InMemoryFileStore::new());

    let services = Arc::new(ListingServices {
        lifecycle: ListingLifecycleService::new(registry.clone(), store.clone(), quota.clone()),
        images: ImageCollectionService::new(store.clone(), quota, files.clone()),
    });

    Ok(Backend {
        registry,
        store,
        files,
        services,
    })
}

/// Read an image from disk, guessing its content type from the extension.
pub(crate) fn read_upload(path: &Path) -> Result<ImageUpload, AppError> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(ImageUpload {
        file_name,
        content_type,
        bytes,
    })
}
