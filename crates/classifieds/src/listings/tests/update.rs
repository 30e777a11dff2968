use super::common::*;
use serde_json::json;

use crate::listings::domain::{AmenityId, AmenityPatch, ListingPatch, ListingStatus};
use crate::listings::{ListingServiceError, ValidationError};

fn patch(value: serde_json::Value) -> ListingPatch {
    serde_json::from_value(value).expect("patch parses")
}

#[test]
fn merging_a_single_detail_keeps_the_rest() {
    let harness = Harness::new();
    let record = harness.draft();

    let outcome = harness
        .lifecycle
        .update(record.listing.id, patch(json!({ "details": { "bedrooms": 4 } })))
        .expect("update succeeds");

    assert!(outcome.changed);
    assert_eq!(outcome.listing.details.get("bedrooms"), Some(&json!(4)));
    assert_eq!(outcome.listing.details.get("bathrooms"), Some(&json!(2)));
    assert_eq!(outcome.listing.details.get("kitchens"), Some(&json!(1)));
}

#[test]
fn identical_payload_reports_no_change_and_skips_the_write() {
    let harness = Harness::new();
    let record = harness.draft();
    let commits = harness.store.commits();

    let outcome = harness
        .lifecycle
        .update(
            record.listing.id,
            patch(json!({
                "title": "Family house with garden",
                "price": 1250000,
                "price_negotiable": 1,
                "surface": 240.0,
                "details": { "kitchens": 1.0, "bedrooms": 3 },
                "amenities": { "add": [1], "remove": [9] }
            })),
        )
        .expect("update succeeds");

    assert!(!outcome.changed);
    assert_eq!(outcome.listing, record);
    assert_eq!(harness.store.commits(), commits);
}

#[test]
fn empty_patch_is_a_no_op() {
    let harness = Harness::new();
    let record = harness.draft();
    let commits = harness.store.commits();

    let outcome = harness
        .lifecycle
        .update(record.listing.id, ListingPatch::default())
        .expect("update succeeds");

    assert!(!outcome.changed);
    assert_eq!(harness.store.commits(), commits);
}

#[test]
fn scalar_details_and_amenities_commit_together() {
    let harness = Harness::new();
    let record = harness.draft();
    let commits = harness.store.commits();

    let outcome = harness
        .lifecycle
        .update(
            record.listing.id,
            ListingPatch {
                details: Some(json!({ "condition": "good" })),
                amenities: Some(AmenityPatch {
                    add: vec![AmenityId(7)],
                    remove: vec![AmenityId(1)],
                }),
                fields: patch(json!({ "price": 1_100_000, "city_id": null })).fields,
            },
        )
        .expect("update succeeds");

    assert!(outcome.changed);
    assert_eq!(outcome.listing.listing.price, 1_100_000.0);
    assert_eq!(outcome.listing.listing.city_id, None);
    assert_eq!(outcome.listing.details.get("condition"), Some(&json!("good")));
    assert_eq!(
        outcome.listing.amenities.iter().copied().collect::<Vec<_>>(),
        vec![AmenityId(2), AmenityId(7)]
    );
    assert_eq!(harness.store.commits(), commits + 1);
}

#[test]
fn update_allows_required_details_to_be_omitted() {
    let harness = Harness::new();
    let record = harness.draft();

    let outcome = harness
        .lifecycle
        .update(record.listing.id, patch(json!({ "details": { "has_garage": true } })))
        .expect("partial details accepted");

    assert!(outcome.changed);
    assert_eq!(outcome.listing.details.len(), record.details.len() + 1);
}

#[test]
fn merged_details_are_revalidated() {
    let harness = Harness::new();
    let record = harness.draft();
    let commits = harness.store.commits();

    match harness
        .lifecycle
        .update(record.listing.id, patch(json!({ "details": { "condition": "ruined" } })))
    {
        Err(ListingServiceError::Validation(ValidationError::RuleViolation {
            field, value, ..
        })) => {
            assert_eq!(field, "condition");
            assert_eq!(value, json!("ruined"));
        }
        other => panic!("expected rule violation, got {other:?}"),
    }
    assert_eq!(harness.store.commits(), commits);
}

#[test]
fn required_detail_cannot_be_cleared() {
    let harness = Harness::new();
    let record = harness.draft();

    match harness
        .lifecycle
        .update(record.listing.id, patch(json!({ "details": { "bedrooms": null } })))
    {
        Err(ListingServiceError::Validation(ValidationError::RuleViolation { field, .. })) => {
            assert_eq!(field, "bedrooms")
        }
        other => panic!("expected rule violation, got {other:?}"),
    }
}

#[test]
fn details_must_be_an_object() {
    let harness = Harness::new();
    let record = harness.draft();

    let error = harness
        .lifecycle
        .update(record.listing.id, patch(json!({ "details": [1, 2] })))
        .expect_err("array details rejected");
    assert_eq!(error.kind(), "rule_violation");
}

#[test]
fn unknown_scalar_key_is_rejected() {
    let harness = Harness::new();
    let record = harness.draft();

    match harness
        .lifecycle
        .update(record.listing.id, patch(json!({ "status": "published" })))
    {
        Err(ListingServiceError::Validation(ValidationError::UnknownField(field))) => {
            assert_eq!(field, "status")
        }
        other => panic!("expected unknown field, got {other:?}"),
    }
}

#[test]
fn category_and_type_are_fixed_after_creation() {
    let harness = Harness::new();
    let record = harness.draft();

    let unchanged = harness
        .lifecycle
        .update(
            record.listing.id,
            patch(json!({ "category_id": 1, "listing_type": "sale" })),
        )
        .expect("restating current values is allowed");
    assert!(!unchanged.changed);

    match harness
        .lifecycle
        .update(record.listing.id, patch(json!({ "category_id": 2 })))
    {
        Err(ListingServiceError::Validation(ValidationError::ImmutableField(field))) => {
            assert_eq!(field, "category_id")
        }
        other => panic!("expected immutable field, got {other:?}"),
    }
}

#[test]
fn scalar_constraints_apply_to_patches() {
    let harness = Harness::new();
    let record = harness.draft();

    for (body, field) in [
        (json!({ "price": -5 }), "price"),
        (json!({ "currency": "dirham" }), "currency"),
        (json!({ "title": "" }), "title"),
        (json!({ "surface": 0 }), "surface"),
    ] {
        match harness.lifecycle.update(record.listing.id, patch(body)) {
            Err(ListingServiceError::Validation(error)) => assert_eq!(error.field(), Some(field)),
            other => panic!("expected {field} violation, got {other:?}"),
        }
    }
}

#[test]
fn amenity_edits_are_idempotent() {
    let harness = Harness::new();
    let record = harness.draft();
    let commits = harness.store.commits();

    let outcome = harness
        .lifecycle
        .update(
            record.listing.id,
            patch(json!({ "amenities": { "add": [2], "remove": [5] } })),
        )
        .expect("update succeeds");

    assert!(!outcome.changed);
    assert_eq!(harness.store.commits(), commits);
}

#[test]
fn only_drafts_accept_updates() {
    let harness = Harness::new();
    let record = harness.pending();

    match harness
        .lifecycle
        .update(record.listing.id, patch(json!({ "title": "Renamed" })))
    {
        Err(ListingServiceError::InvalidState { listing_id, status }) => {
            assert_eq!(listing_id, record.listing.id);
            assert_eq!(status, ListingStatus::PendingValidation);
        }
        other => panic!("expected invalid state, got {other:?}"),
    }
}
