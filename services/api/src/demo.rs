use crate::infra::{in_memory_backend, load_registry, read_upload};
use crate::routes::schema_catalog;
use clap::Args;
use classifieds::config::AppConfig;
use classifieds::error::AppError;
use classifieds::listings::{
    AmenityId, ImageUpload, ListingPatch, ListingRecord, ListingRepository, ListingType,
    NewListing, OwnerId, SubscriptionId,
};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct SchemaCatalogArgs {
    /// Read schemas from this JSON document instead of the configured source
    #[arg(long)]
    pub(crate) schema_path: Option<PathBuf>,
    /// Only print schemas for one category id
    #[arg(long)]
    pub(crate) category: Option<u32>,
    /// Emit the catalog as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Owner id used for the demo listing
    #[arg(long, default_value = "demo-agency")]
    pub(crate) owner: String,
    /// Subscription charged when the listing is submitted
    #[arg(long)]
    pub(crate) subscription: Option<String>,
    /// Image files to attach. Placeholder images are generated when omitted.
    #[arg(long = "image")]
    pub(crate) images: Vec<PathBuf>,
    /// Reject the listing with this reason instead of approving it
    #[arg(long)]
    pub(crate) reject: Option<String>,
}

pub(crate) fn run_schema_catalog(args: SchemaCatalogArgs) -> Result<(), AppError> {
    let SchemaCatalogArgs {
        schema_path,
        category,
        json,
    } = args;

    let mut config = AppConfig::load()?;
    if schema_path.is_some() {
        config.listings.schema_path = schema_path;
    }

    let registry = load_registry(&config.listings)?;
    let catalog: Vec<_> = schema_catalog(&registry)
        .into_iter()
        .filter(|view| category.map_or(true, |id| view.category_id == id))
        .collect();

    if json {
        match serde_json::to_string_pretty(&catalog) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => println!("Schema catalog unavailable: {err}"),
        }
        return Ok(());
    }

    println!("{} schema(s) registered", catalog.len());
    for view in catalog {
        println!(
            "\n{} ({}) / {}",
            view.category.as_deref().unwrap_or("unnamed"),
            view.category_id,
            view.listing_type
        );
        for field in &view.fields {
            let marker = if field.required { "*" } else { " " };
            println!("  {marker} {:<22} {}", field.name, field.rule);
        }
    }
    println!("\n* required on creation");
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        owner,
        subscription,
        images,
        reject,
    } = args;

    let config = AppConfig::load()?;
    let backend = in_memory_backend(&config.listings)?;
    let lifecycle = &backend.services.lifecycle;
    let gallery = &backend.services.images;
    let owner = OwnerId(owner);

    println!("Classified listing demo ({} schemas loaded)", backend.registry.len());

    println!("\nCreating a house for sale without the bathrooms count");
    let mut payload = demo_listing();
    payload.details.remove("bathrooms");
    match lifecycle.create(payload, owner.clone()) {
        Ok(record) => println!("  Unexpectedly accepted as {}", record.listing.reference),
        Err(err) => println!("  Rejected [{}]: {}", err.kind(), err),
    }

    let record = lifecycle.create(demo_listing(), owner)?;
    let id = record.listing.id;
    println!(
        "- Draft {} created (listing {}, status {})",
        record.listing.reference, id, record.listing.status
    );
    print_details("  Details", &record);

    let resend = ListingPatch {
        fields: object(json!({ "title": record.listing.title, "price": record.listing.price })),
        ..ListingPatch::default()
    };
    let outcome = lifecycle.update(id, resend)?;
    println!(
        "- Re-sent unchanged title and price -> changed={} (writes so far: {})",
        outcome.changed,
        backend.store.commits()
    );

    let edit: ListingPatch = match serde_json::from_value(json!({
        "price": 1_190_000,
        "details": { "bedrooms": 4, "has_pool": true },
        "amenities": { "add": [5], "remove": [2] }
    })) {
        Ok(patch) => patch,
        Err(err) => {
            println!("  Demo patch unavailable: {err}");
            return Ok(());
        }
    };
    let outcome = lifecycle.update(id, edit)?;
    println!(
        "- Price, details and amenities edited -> changed={} (writes so far: {})",
        outcome.changed,
        backend.store.commits()
    );
    print_details("  Details", &outcome.listing);
    println!(
        "  Amenities: {:?}",
        outcome
            .listing
            .amenities
            .iter()
            .map(|amenity| amenity.0)
            .collect::<Vec<_>>()
    );

    let uploads = if images.is_empty() {
        placeholder_uploads()
    } else {
        images
            .iter()
            .map(|path| read_upload(path))
            .collect::<Result<Vec<_>, _>>()?
    };
    let added = gallery.add_images(id, uploads)?;
    println!("- {} image(s) attached", added.len());

    let reversed: Vec<_> = added.iter().rev().map(|image| image.id).collect();
    for image in gallery.reorder_images(id, &reversed)? {
        println!(
            "  #{} {} ({}) -> {}",
            image.position,
            image.original_name,
            image.id,
            image.path
        );
    }
    println!("  Stored files: {}", backend.files.paths().len());

    let subscription = subscription.map(SubscriptionId);
    let pending = lifecycle.submit(id, subscription.as_ref())?;
    println!("- Submitted -> status {}", pending.listing.status);

    match gallery.add_images(id, placeholder_uploads()) {
        Ok(_) => println!("  Gallery unexpectedly accepted new images"),
        Err(err) => println!("  Gallery frozen [{}]: {}", err.kind(), err),
    }

    let moderated = match reject {
        Some(reason) => lifecycle.reject(id, &reason)?,
        None => lifecycle.approve(id)?,
    };
    println!(
        "- Moderated -> status {} (published: {})",
        moderated.listing.status, moderated.listing.is_published
    );
    if let Some(reason) = &moderated.listing.rejection_reason {
        println!("  Rejection reason: {reason}");
    }

    match backend.store.fetch(id) {
        Ok(Some(stored)) => match serde_json::to_string_pretty(&stored) {
            Ok(rendered) => println!("  Stored listing:\n{rendered}"),
            Err(err) => println!("  Stored listing unavailable: {err}"),
        },
        Ok(None) => println!("  Repository lookup returned no record"),
        Err(err) => println!("  Repository unavailable: {err}"),
    }

    Ok(())
}

fn demo_listing() -> NewListing {
    NewListing {
        category_id: 1,
        listing_type: ListingType::Sale,
        title: "Riad-style family house near the medina".to_string(),
        description: Some("Renovated patio house with a roof terrace.".to_string()),
        price: 1_250_000.0,
        currency: "MAD".to_string(),
        price_negotiable: true,
        surface: Some(210.0),
        city_id: Some(3),
        district_id: Some(31),
        address: None,
        details: object(json!({
            "bedrooms": 3,
            "bathrooms": 2,
            "kitchens": 1,
            "condition": "good"
        })),
        amenities: Some(vec![AmenityId(1), AmenityId(2)]),
    }
}

fn placeholder_uploads() -> Vec<ImageUpload> {
    ["facade.jpg", "patio.jpg", "terrace.jpg"]
        .into_iter()
        .map(|name| ImageUpload {
            file_name: name.to_string(),
            content_type: mime_guess::from_path(name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
        })
        .collect()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn print_details(label: &str, record: &ListingRecord) {
    let rendered: Vec<_> = record
        .details
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    println!("{label}: {}", rendered.join(", "));
}
