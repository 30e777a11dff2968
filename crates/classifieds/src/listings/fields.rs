//! Typed access to the listing's scalar attributes.
//!
//! Patches arrive as loose JSON. Each key is resolved to a [`ScalarField`], parsed into a
//! [`FieldValue`] of the declared kind, and compared with the stored value using the
//! comparison strategy that kind selects.

use serde::Serialize;
use serde_json::Value;

use super::domain::{Listing, NewListing};
use super::schema::{boolean_value, integer_value, numeric_value, ValidationError};

const TITLE_MAX_CHARS: usize = 150;
const ADDRESS_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarField {
    Title,
    Description,
    Price,
    Currency,
    PriceNegotiable,
    Surface,
    CityId,
    DistrictId,
    Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Integer,
    Flag,
}

/// How a stored value and an incoming value are compared during diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Both sides read as `f64`.
    Numeric,
    /// Both sides read as `bool`.
    Boolean,
    /// Exact equality.
    Strict,
}

impl ScalarField {
    pub const fn ordered() -> [Self; 9] {
        [
            Self::Title,
            Self::Description,
            Self::Price,
            Self::Currency,
            Self::PriceNegotiable,
            Self::Surface,
            Self::CityId,
            Self::DistrictId,
            Self::Address,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Price => "price",
            Self::Currency => "currency",
            Self::PriceNegotiable => "price_negotiable",
            Self::Surface => "surface",
            Self::CityId => "city_id",
            Self::DistrictId => "district_id",
            Self::Address => "address",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ordered().into_iter().find(|field| field.key() == key)
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Title | Self::Description | Self::Currency | Self::Address => FieldKind::Text,
            Self::Price | Self::Surface => FieldKind::Number,
            Self::CityId | Self::DistrictId => FieldKind::Integer,
            Self::PriceNegotiable => FieldKind::Flag,
        }
    }

    pub const fn comparison(self) -> Comparison {
        match self.kind() {
            FieldKind::Number | FieldKind::Integer => Comparison::Numeric,
            FieldKind::Flag => Comparison::Boolean,
            FieldKind::Text => Comparison::Strict,
        }
    }
}

/// A scalar attribute together with its typed value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Title(String),
    Description(Option<String>),
    Price(f64),
    Currency(String),
    PriceNegotiable(bool),
    Surface(Option<f64>),
    CityId(Option<u64>),
    DistrictId(Option<u64>),
    Address(Option<String>),
}

impl FieldValue {
    pub fn field(&self) -> ScalarField {
        match self {
            Self::Title(_) => ScalarField::Title,
            Self::Description(_) => ScalarField::Description,
            Self::Price(_) => ScalarField::Price,
            Self::Currency(_) => ScalarField::Currency,
            Self::PriceNegotiable(_) => ScalarField::PriceNegotiable,
            Self::Surface(_) => ScalarField::Surface,
            Self::CityId(_) => ScalarField::CityId,
            Self::DistrictId(_) => ScalarField::DistrictId,
            Self::Address(_) => ScalarField::Address,
        }
    }

    /// Current value of `field` on `listing`.
    pub fn read(field: ScalarField, listing: &Listing) -> Self {
        match field {
            ScalarField::Title => Self::Title(listing.title.clone()),
            ScalarField::Description => Self::Description(listing.description.clone()),
            ScalarField::Price => Self::Price(listing.price),
            ScalarField::Currency => Self::Currency(listing.currency.clone()),
            ScalarField::PriceNegotiable => Self::PriceNegotiable(listing.price_negotiable),
            ScalarField::Surface => Self::Surface(listing.surface),
            ScalarField::CityId => Self::CityId(listing.city_id),
            ScalarField::DistrictId => Self::DistrictId(listing.district_id),
            ScalarField::Address => Self::Address(listing.address.clone()),
        }
    }

    /// Parse a raw patch value for `field`, enforcing kind and attribute constraints.
    pub fn parse(field: ScalarField, raw: &Value) -> Result<Self, ValidationError> {
        let key = field.key();
        let value = match field {
            ScalarField::Title => Self::Title(required_text(key, raw)?),
            ScalarField::Description => Self::Description(optional_text(key, raw)?),
            ScalarField::Price => Self::Price(
                numeric_value(raw).ok_or_else(|| ValidationError::violation(key, "number", raw))?,
            ),
            ScalarField::Currency => Self::Currency(required_text(key, raw)?),
            ScalarField::PriceNegotiable => Self::PriceNegotiable(
                boolean_value(raw).ok_or_else(|| ValidationError::violation(key, "boolean", raw))?,
            ),
            ScalarField::Surface => Self::Surface(nullable(raw, |raw| {
                numeric_value(raw).ok_or_else(|| ValidationError::violation(key, "number", raw))
            })?),
            ScalarField::CityId => Self::CityId(nullable(raw, |raw| identifier(key, raw))?),
            ScalarField::DistrictId => Self::DistrictId(nullable(raw, |raw| identifier(key, raw))?),
            ScalarField::Address => Self::Address(optional_text(key, raw)?),
        };
        value.check()?;
        Ok(value)
    }

    /// Attribute constraints shared by creation and patching.
    pub fn check(&self) -> Result<(), ValidationError> {
        let key = self.field().key();
        match self {
            Self::Title(title) => {
                if title.trim().is_empty() || title.chars().count() > TITLE_MAX_CHARS {
                    return Err(ValidationError::violation(
                        key,
                        format!("non-empty string, at most {TITLE_MAX_CHARS} characters"),
                        &Value::String(title.clone()),
                    ));
                }
            }
            Self::Price(price) => {
                if !price.is_finite() || *price < 0.0 {
                    return Err(ValidationError::violation(
                        key,
                        "number, minimum 0",
                        &serde_json::json!(price),
                    ));
                }
            }
            Self::Surface(Some(surface)) => {
                if !surface.is_finite() || *surface <= 0.0 {
                    return Err(ValidationError::violation(
                        key,
                        "number, greater than 0",
                        &serde_json::json!(surface),
                    ));
                }
            }
            Self::Currency(code) => {
                if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                    return Err(ValidationError::violation(
                        key,
                        "three-letter ISO 4217 code",
                        &Value::String(code.clone()),
                    ));
                }
            }
            Self::Address(Some(address)) => {
                if address.chars().count() > ADDRESS_MAX_CHARS {
                    return Err(ValidationError::violation(
                        key,
                        format!("string, at most {ADDRESS_MAX_CHARS} characters"),
                        &Value::String(address.clone()),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether writing `self` over `stored` would change anything.
    pub fn differs_from(&self, stored: &Self) -> bool {
        match self.field().comparison() {
            Comparison::Numeric => self.numeric() != stored.numeric(),
            Comparison::Boolean => self.flag() != stored.flag(),
            Comparison::Strict => self != stored,
        }
    }

    pub fn apply(self, listing: &mut Listing) {
        match self {
            Self::Title(value) => listing.title = value,
            Self::Description(value) => listing.description = value,
            Self::Price(value) => listing.price = value,
            Self::Currency(value) => listing.currency = value,
            Self::PriceNegotiable(value) => listing.price_negotiable = value,
            Self::Surface(value) => listing.surface = value,
            Self::CityId(value) => listing.city_id = value,
            Self::DistrictId(value) => listing.district_id = value,
            Self::Address(value) => listing.address = value,
        }
    }

    fn numeric(&self) -> Option<f64> {
        match self {
            Self::Price(value) => Some(*value),
            Self::Surface(value) => *value,
            Self::CityId(value) | Self::DistrictId(value) => value.map(|id| id as f64),
            _ => None,
        }
    }

    fn flag(&self) -> Option<bool> {
        match self {
            Self::PriceNegotiable(value) => Some(*value),
            _ => None,
        }
    }
}

/// Scalar constraints for a creation payload.
pub fn check_new_listing(payload: &NewListing) -> Result<(), ValidationError> {
    [
        FieldValue::Title(payload.title.clone()),
        FieldValue::Price(payload.price),
        FieldValue::Currency(payload.currency.clone()),
        FieldValue::Surface(payload.surface),
        FieldValue::Address(payload.address.clone()),
    ]
    .iter()
    .try_for_each(FieldValue::check)
}

/// `Some(unchanged?)` for keys fixed at creation, `None` for every other key.
pub(crate) fn immutable_key_unchanged(key: &str, raw: &Value, listing: &Listing) -> Option<bool> {
    match key {
        "category_id" => Some(integer_value(raw) == Some(i64::from(listing.category_id))),
        "listing_type" => Some(raw.as_str() == Some(listing.listing_type.as_str())),
        _ => None,
    }
}

fn required_text(key: &str, raw: &Value) -> Result<String, ValidationError> {
    raw.as_str()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::violation(key, "string", raw))
}

fn optional_text(key: &str, raw: &Value) -> Result<Option<String>, ValidationError> {
    nullable(raw, |raw| required_text(key, raw))
}

fn identifier(key: &str, raw: &Value) -> Result<u64, ValidationError> {
    integer_value(raw)
        .and_then(|id| u64::try_from(id).ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| ValidationError::violation(key, "positive integer", raw))
}

fn nullable<T>(
    raw: &Value,
    parse: impl FnOnce(&Value) -> Result<T, ValidationError>,
) -> Result<Option<T>, ValidationError> {
    if raw.is_null() {
        Ok(None)
    } else {
        parse(raw).map(Some)
    }
}
