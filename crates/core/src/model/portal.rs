//! Portal identifiers and property type enums.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// External rental-listing website.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Portal {
    #[serde(rename = "wg-gesucht")]
    WgGesucht,
    #[serde(rename = "immobilienscout24")]
    ImmobilienScout24,
    #[serde(rename = "immowelt")]
    Immowelt,
    #[serde(rename = "kleinanzeigen")]
    Kleinanzeigen,
    #[serde(rename = "immonet")]
    Immonet,
}

impl Portal {
    pub const ALL: [Portal; 5] =
        [Portal::WgGesucht, Portal::ImmobilienScout24, Portal::Immowelt, Portal::Kleinanzeigen, Portal::Immonet];

    /// Stable identifier used in ids, logs and config.
    pub fn id(self) -> &'static str {
        match self {
            Portal::WgGesucht => "wg-gesucht",
            Portal::ImmobilienScout24 => "immobilienscout24",
            Portal::Immowelt => "immowelt",
            Portal::Kleinanzeigen => "kleinanzeigen",
            Portal::Immonet => "immonet",
        }
    }

    /// Origin that relative links on this portal resolve against.
    pub fn base_url(self) -> &'static str {
        match self {
            Portal::WgGesucht => "https://www.wg-gesucht.de",
            Portal::ImmobilienScout24 => "https://www.immobilienscout24.de",
            Portal::Immowelt => "https://www.immowelt.de",
            Portal::Kleinanzeigen => "https://www.kleinanzeigen.de",
            Portal::Immonet => "https://www.immonet.de",
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Portal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Portal::ALL
            .into_iter()
            .find(|p| p.id() == needle)
            .ok_or_else(|| format!("unknown portal: {s}"))
    }
}

/// Canonical property type of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Apartment,
    Room,
    House,
    Studio,
}

impl PropertyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::Room => "room",
            PropertyType::House => "house",
            PropertyType::Studio => "studio",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Property type as requested in search criteria; `Any` disables the filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PropertyTypeFilter {
    #[default]
    Any,
    Apartment,
    Room,
    House,
    Studio,
}

impl PropertyTypeFilter {
    /// The concrete type, or `None` for `Any`.
    pub fn as_type(self) -> Option<PropertyType> {
        match self {
            PropertyTypeFilter::Any => None,
            PropertyTypeFilter::Apartment => Some(PropertyType::Apartment),
            PropertyTypeFilter::Room => Some(PropertyType::Room),
            PropertyTypeFilter::House => Some(PropertyType::House),
            PropertyTypeFilter::Studio => Some(PropertyType::Studio),
        }
    }
}

impl From<PropertyType> for PropertyTypeFilter {
    fn from(value: PropertyType) -> Self {
        match value {
            PropertyType::Apartment => PropertyTypeFilter::Apartment,
            PropertyType::Room => PropertyTypeFilter::Room,
            PropertyType::House => PropertyTypeFilter::House,
            PropertyType::Studio => PropertyTypeFilter::Studio,
        }
    }
}
