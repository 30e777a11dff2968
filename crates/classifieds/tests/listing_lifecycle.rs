//! End-to-end scenarios for listing creation, moderation and gallery management.
//!
//! Everything here goes through the public service facades and the HTTP router. Collaborators
//! are either the bundled in-memory implementations or small doubles written against the
//! public traits.

mod common {
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Map, Value};

    use classifieds::listings::{
        FieldSpecSet, ImageCollectionService, InMemoryFileStore, InMemoryListingStore,
        InMemoryQuotaGate, Listing, ListingLifecycleService, ListingType, NewListing, OwnerId,
        QuotaError, QuotaGate, SchemaRegistry, SubscriptionId, ValidationRule,
    };

    pub(super) fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::bundled().expect("bundled schemas load"))
    }

    /// Records which subscription paid for each submission and never runs out.
    #[derive(Default)]
    pub(super) struct LedgerQuota {
        pub(super) charges: Mutex<Vec<(OwnerId, Option<SubscriptionId>, u32)>>,
    }

    impl QuotaGate for LedgerQuota {
        fn can_add_images(&self, _listing: &Listing, count: usize) -> Result<bool, QuotaError> {
            Ok(count <= 2)
        }

        fn consume_listing_slot(
            &self,
            owner: &OwnerId,
            subscription: Option<&SubscriptionId>,
            amount: u32,
        ) -> Result<(), QuotaError> {
            self.charges
                .lock()
                .expect("ledger mutex poisoned")
                .push((owner.clone(), subscription.cloned(), amount));
            Ok(())
        }

        fn release_listing_slot(
            &self,
            owner: &OwnerId,
            subscription: Option<&SubscriptionId>,
            amount: u32,
        ) -> Result<(), QuotaError> {
            let mut charges = self.charges.lock().expect("ledger mutex poisoned");
            if let Some(index) = charges.iter().rposition(|(charged, sub, charged_amount)| {
                charged == owner && sub.as_ref() == subscription && *charged_amount == amount
            }) {
                charges.remove(index);
            }
            Ok(())
        }
    }

    pub(super) struct Engine<Q> {
        pub(super) store: Arc<InMemoryListingStore>,
        pub(super) quota: Arc<Q>,
        pub(super) lifecycle: ListingLifecycleService<InMemoryListingStore, Q>,
        pub(super) images: ImageCollectionService<InMemoryListingStore, Q, InMemoryFileStore>,
    }

    pub(super) fn engine<Q: QuotaGate + 'static>(quota: Q) -> Engine<Q> {
        let store = Arc::new(InMemoryListingStore::new());
        let quota = Arc::new(quota);
        Engine {
            lifecycle: ListingLifecycleService::new(registry(), store.clone(), quota.clone()),
            images: ImageCollectionService::new(
                store.clone(),
                quota.clone(),
                Arc::new(InMemoryFileStore::new()),
            ),
            store,
            quota,
        }
    }

    pub(super) fn in_memory_engine() -> Engine<InMemoryQuotaGate> {
        let store = InMemoryListingStore::new();
        let quota = InMemoryQuotaGate::new(store.clone(), 10, 5);
        let store = Arc::new(store);
        let quota = Arc::new(quota);
        Engine {
            lifecycle: ListingLifecycleService::new(registry(), store.clone(), quota.clone()),
            images: ImageCollectionService::new(
                store.clone(),
                quota.clone(),
                Arc::new(InMemoryFileStore::new()),
            ),
            store,
            quota,
        }
    }

    /// A value every rule accepts.
    pub(super) fn sample(rule: &ValidationRule) -> Value {
        match rule {
            ValidationRule::Integer { min, .. } => json!(min.unwrap_or(0).max(1)),
            ValidationRule::Number { min, .. } => json!(min.unwrap_or(0.0) + 1.0),
            ValidationRule::Boolean => json!(true),
            ValidationRule::String { .. } => json!("ok"),
            ValidationRule::OneOf { values } => json!(values[0]),
        }
    }

    pub(super) fn required_details(specs: &FieldSpecSet) -> Map<String, Value> {
        specs
            .required()
            .map(|spec| (spec.name.clone(), sample(&spec.rule)))
            .collect()
    }

    pub(super) fn payload(
        category_id: u32,
        listing_type: ListingType,
        details: Map<String, Value>,
    ) -> NewListing {
        NewListing {
            category_id,
            listing_type,
            title: "Bright corner unit".to_string(),
            description: None,
            price: 4500.0,
            currency: "MAD".to_string(),
            price_negotiable: false,
            surface: Some(85.5),
            city_id: Some(1),
            district_id: None,
            address: None,
            details,
            amenities: None,
        }
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use classifieds::listings::{
    listing_router, ImageUpload, ListingPatch, ListingServiceError, ListingServices,
    ListingStatus, ListingType, OwnerId, SchemaKey, SubscriptionId, ValidationError,
};

use common::*;

fn owner() -> OwnerId {
    OwnerId("agency-42".to_string())
}

fn photo(name: &str) -> ImageUpload {
    ImageUpload {
        file_name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

#[test]
fn every_registered_schema_accepts_its_required_fields_only_when_complete() {
    let registry = registry();
    let engine = in_memory_engine();

    for key in registry.keys() {
        let specs = registry.lookup(key).expect("listed key resolves");
        let complete = required_details(specs);

        let record = engine
            .lifecycle
            .create(
                payload(key.category_id, key.listing_type, complete.clone()),
                owner(),
            )
            .unwrap_or_else(|err| panic!("{key} rejected complete details: {err}"));
        assert_eq!(record.details, complete);

        for spec in specs.required() {
            let mut partial = complete.clone();
            partial.remove(&spec.name);
            match engine
                .lifecycle
                .create(payload(key.category_id, key.listing_type, partial), owner())
            {
                Err(ListingServiceError::Validation(ValidationError::MissingRequiredField(
                    field,
                ))) => assert_eq!(field, spec.name, "{key}"),
                other => panic!("{key}: expected missing {}, got {other:?}", spec.name),
            }
        }
    }
}

#[test]
fn unregistered_pairs_never_reach_storage() {
    let engine = in_memory_engine();

    match engine.lifecycle.create(
        payload(99, ListingType::Rent, Default::default()),
        owner(),
    ) {
        Err(ListingServiceError::Validation(ValidationError::SchemaNotFound(key))) => {
            assert_eq!(key, SchemaKey::new(99, ListingType::Rent))
        }
        other => panic!("expected schema not found, got {other:?}"),
    }
    assert_eq!(engine.store.commits(), 0);
}

#[test]
fn draft_to_publication_with_gallery() {
    let engine = engine(LedgerQuota::default());
    let details = json!({ "bedrooms": 2, "bathrooms": 1, "floor": 3, "furnished": true });
    let details = match details {
        Value::Object(map) => map,
        _ => unreachable!(),
    };

    let record = engine
        .lifecycle
        .create(payload(2, ListingType::Rent, details), owner())
        .expect("apartment rental created");
    let id = record.listing.id;

    let patch: ListingPatch = serde_json::from_value(json!({
        "price": 4800,
        "details": { "bedrooms": 3 },
        "amenities": { "add": [3, 8] }
    }))
    .expect("patch parses");
    let outcome = engine.lifecycle.update(id, patch).expect("update applied");
    assert!(outcome.changed);
    assert_eq!(outcome.listing.details["bedrooms"], json!(3));
    assert_eq!(outcome.listing.details["floor"], json!(3));
    assert_eq!(outcome.listing.amenities.len(), 2);

    let added = engine
        .images
        .add_images(id, vec![photo("living.png"), photo("bedroom.png")])
        .expect("gallery stored");
    engine
        .images
        .reorder_images(id, &[added[1].id, added[0].id])
        .expect("gallery reordered");

    let subscription = SubscriptionId("premium-2026".to_string());
    engine
        .lifecycle
        .submit(id, Some(&subscription))
        .expect("submitted");
    let published = engine.lifecycle.approve(id).expect("approved");

    assert_eq!(published.listing.status, ListingStatus::Published);
    assert!(published.listing.is_published);
    let charges = engine.quota.charges.lock().expect("ledger mutex poisoned");
    assert_eq!(charges.as_slice(), &[(owner(), Some(subscription), 1)]);

    let gallery = engine.images.list_images(id).expect("gallery listed");
    assert_eq!(gallery[0].id, added[1].id);
    assert!(matches!(
        engine.images.add_images(id, vec![photo("late.png")]),
        Err(ListingServiceError::InvalidState { .. })
    ));
}

#[test]
fn quota_gate_decides_image_capacity() {
    let engine = engine(LedgerQuota::default());
    let details = registry()
        .lookup(SchemaKey::new(3, ListingType::Sale))
        .map(required_details)
        .expect("land sale schema");
    let record = engine
        .lifecycle
        .create(payload(3, ListingType::Sale, details), owner())
        .expect("land listing created");

    let error = engine
        .images
        .add_images(
            record.listing.id,
            vec![photo("a.png"), photo("b.png"), photo("c.png")],
        )
        .expect_err("three photos exceed the ledger cap");
    assert_eq!(error.kind(), "quota_exceeded");
    assert_eq!(engine.store.image_count(record.listing.id), 0);
}

#[tokio::test]
async fn moderation_over_http() {
    let engine = in_memory_engine();
    let app = listing_router(Arc::new(ListingServices {
        lifecycle: engine.lifecycle,
        images: engine.images,
    }));

    let create = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/listings")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "owner_id": "agency-42",
                "category_id": 5,
                "listing_type": "rent",
                "title": "Corner shop on the boulevard",
                "price": 9000,
                "currency": "MAD",
                "details": required_details(
                    registry()
                        .lookup(SchemaKey::new(5, ListingType::Rent))
                        .expect("shop rental schema")
                )
            })
            .to_string(),
        ))
        .expect("request builds");
    let response = app.clone().oneshot(create).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body");
    let created: Value = serde_json::from_slice(&body).expect("json");
    let id = created["listing"]["id"].as_u64().expect("numeric id");

    for (path, body, expected) in [
        ("submit", json!({}), StatusCode::OK),
        ("reject", json!({ "reason": "" }), StatusCode::UNPROCESSABLE_ENTITY),
        ("reject", json!({ "reason": "blurry photos" }), StatusCode::OK),
        ("approve", json!({}), StatusCode::CONFLICT),
    ] {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/listings/{id}/{path}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds");
        let response = app.clone().oneshot(request).await.expect("router responds");
        assert_eq!(response.status(), expected, "{path} {body}");
    }
}
