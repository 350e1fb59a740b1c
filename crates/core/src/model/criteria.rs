//! Search criteria, validation and canonical cache-key derivation.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::portal::PropertyTypeFilter;
use crate::Error;

/// Prefix shared by every search cache key.
pub const KEY_PREFIX: &str = "search:";

const MIN_BUDGET: f64 = 100.0;
const MAX_BUDGET: f64 = 5000.0;
const MAX_MIN_ROOMS: u8 = 10;
const MAX_RESULTS_PER_SOURCE: u16 = 100;

fn default_max_results_per_source() -> u16 {
    50
}

/// What the caller is looking for.
///
/// Immutable value; its canonical form is the cache key material, so
/// semantically identical queries collide on the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchCriteria {
    /// City or locality name.
    #[serde(default)]
    pub city: Option<String>,

    /// Property type filter (default: any).
    #[serde(default)]
    pub property_type: PropertyTypeFilter,

    /// Minimum number of rooms (0-10, 0 means no minimum).
    #[serde(default)]
    pub min_rooms: Option<u8>,

    /// Maximum monthly rent in EUR (100-5000).
    #[serde(default)]
    pub max_budget: Option<f64>,

    /// Upper bound of raw results taken from each portal (1-100, default 50).
    #[serde(default = "default_max_results_per_source")]
    pub max_results_per_source: u16,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            city: None,
            property_type: PropertyTypeFilter::Any,
            min_rooms: None,
            max_budget: None,
            max_results_per_source: default_max_results_per_source(),
        }
    }
}

impl SearchCriteria {
    /// Criteria for a city with every other field at its default.
    pub fn for_city(city: impl Into<String>) -> Self {
        Self { city: Some(city.into()), ..Default::default() }
    }

    /// Validate the criteria.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCriteria` if:
    /// - `city` is shorter than 2 or longer than 100 characters, or contains
    ///   anything other than letters, spaces, hyphens and apostrophes
    /// - `min_rooms` exceeds 10, or exceeds 1 for a `room` search
    /// - `max_budget` is outside 100-5000
    /// - `max_results_per_source` is outside 1-100
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(city) = self.city.as_deref().map(str::trim)
            && !city.is_empty()
        {
            let len = city.chars().count();
            if len < 2 {
                return Err(Error::InvalidCriteria("city must have at least 2 characters".into()));
            }
            if len > 100 {
                return Err(Error::InvalidCriteria("city must not exceed 100 characters".into()));
            }
            if !city
                .chars()
                .all(|c| c.is_alphabetic() || c.is_whitespace() || c == '-' || c == '\'')
            {
                return Err(Error::InvalidCriteria(
                    "city may only contain letters, spaces, hyphens and apostrophes".into(),
                ));
            }
        }

        if let Some(rooms) = self.min_rooms {
            if rooms > MAX_MIN_ROOMS {
                return Err(Error::InvalidCriteria(format!("min_rooms must not exceed {MAX_MIN_ROOMS}")));
            }
            if self.property_type == PropertyTypeFilter::Room && rooms > 1 {
                return Err(Error::InvalidCriteria("min_rooms must not exceed 1 for room searches".into()));
            }
        }

        if let Some(budget) = self.max_budget
            && !(budget.is_finite() && (MIN_BUDGET..=MAX_BUDGET).contains(&budget))
        {
            return Err(Error::InvalidCriteria(format!(
                "max_budget must be between {MIN_BUDGET} and {MAX_BUDGET}"
            )));
        }

        if self.max_results_per_source == 0 || self.max_results_per_source > MAX_RESULTS_PER_SOURCE {
            return Err(Error::InvalidCriteria(format!(
                "max_results_per_source must be between 1 and {MAX_RESULTS_PER_SOURCE}"
            )));
        }

        Ok(())
    }

    /// Canonical form: trimmed, lowercased city; empty values dropped.
    pub fn canonical(&self) -> Self {
        let city = self
            .city
            .as_deref()
            .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .filter(|c| !c.is_empty());

        Self {
            city,
            property_type: self.property_type,
            min_rooms: self.min_rooms.filter(|r| *r > 0),
            max_budget: self.max_budget,
            max_results_per_source: self.max_results_per_source,
        }
    }

    /// Derive the cache key from the canonical criteria.
    ///
    /// Fields are emitted in sorted order and absent/empty ones are omitted.
    pub fn cache_key(&self) -> CriteriaKey {
        let canonical = self.canonical();
        let mut fields: BTreeMap<&'static str, Value> = BTreeMap::new();

        if let Some(city) = canonical.city {
            fields.insert("city", Value::from(city));
        }
        if let Some(kind) = canonical.property_type.as_type() {
            fields.insert("property_type", Value::from(kind.as_str()));
        }
        if let Some(rooms) = canonical.min_rooms {
            fields.insert("min_rooms", Value::from(rooms));
        }
        if let Some(budget) = canonical.max_budget {
            fields.insert("max_budget", Value::from(budget));
        }
        fields.insert("max_results_per_source", Value::from(canonical.max_results_per_source));

        let json = serde_json::to_string(&fields).unwrap_or_default();
        CriteriaKey(format!("{KEY_PREFIX}{json}"))
    }

    /// Copy of these criteria with a different city term.
    pub fn with_city(&self, city: impl Into<String>) -> Self {
        Self { city: Some(city.into()), ..self.clone() }
    }
}

/// Cache key derived from canonical criteria.
///
/// Human-readable (`search:{"city":"berlin",...}`) so wildcard patterns can
/// match the embedded criteria.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CriteriaKey(String);

impl CriteriaKey {
    /// Wrap an already-derived key string.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wildcard pattern matching every key that mentions `city`.
    pub fn city_pattern(city: &str) -> String {
        let city = city.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        format!("{KEY_PREFIX}*{city}*")
    }
}

impl fmt::Display for CriteriaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CriteriaKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
