//! Weakly typed record produced by a connector.
//!
//! Portal markup is unstable, so connectors hand over a plain string map and
//! leave every interpretation to the normalizer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known field names.
pub mod field {
    pub const EXTERNAL_ID: &str = "external_id";
    pub const TITLE: &str = "title";
    pub const PRICE: &str = "price";
    pub const AREA: &str = "area";
    pub const ROOMS: &str = "rooms";
    pub const LOCATION: &str = "location";
    pub const URL: &str = "url";
    pub const IMAGE: &str = "image";
    pub const PUBLISHED: &str = "published";
    pub const TYPE: &str = "type";
    pub const DESCRIPTION: &str = "description";
    /// Whole text of the scraped item; secondary source for rooms and area.
    pub const SUMMARY: &str = "summary";
    pub const PARKING: &str = "parking";
    pub const BALCONY: &str = "balcony";
    pub const GARDEN: &str = "garden";
    pub const ELEVATOR: &str = "elevator";
    pub const FURNISHED: &str = "furnished";
}

/// Untyped bag of portal fields. Missing and blank values are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    fields: BTreeMap<String, String>,
}

impl RawListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; blank values are ignored.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, Some(value));
        self
    }

    /// Insert `value` under `key` if it is present and not blank.
    pub fn set(&mut self, key: &str, value: Option<impl Into<String>>) {
        if let Some(value) = value {
            let value = value.into();
            if !value.trim().is_empty() {
                self.fields.insert(key.to_string(), value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
