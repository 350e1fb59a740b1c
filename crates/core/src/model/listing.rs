//! Canonical, portal-agnostic listing record.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::portal::{Portal, PropertyType};

/// Monthly rent as a numeric amount plus currency symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Price {
    pub fn eur(amount: f64) -> Self {
        Self { amount, currency: "€".into() }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Tri-state amenity flags; `None` means the portal did not say.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Features {
    pub parking: Option<bool>,
    pub balcony: Option<bool>,
    pub garden: Option<bool>,
    pub elevator: Option<bool>,
    pub furnished: Option<bool>,
}

/// A normalized listing.
///
/// Only the normalizer constructs these, and only when `url` and `title`
/// are non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Listing {
    /// `<portal>:<hash>` derived from the external id or URL.
    pub id: String,
    pub source: Portal,
    pub external_id: Option<String>,
    /// Absolute URL of the ad.
    pub url: String,
    pub title: String,
    pub price: Option<Price>,
    pub area_sqm: Option<f64>,
    pub main_image: Option<String>,
    pub location: Option<String>,
    pub property_type: PropertyType,
    pub published_at: Option<DateTime<Utc>>,
    /// Room count in 1-20.
    pub rooms: Option<u8>,
    #[serde(default)]
    pub features: Features,
    pub description: Option<String>,
}
