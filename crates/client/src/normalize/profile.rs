//! Per-portal extraction rules for prices, areas, rooms and property types.

use regex::Regex;
use rentwire_core::{Portal, PropertyType};

/// Amount with optional German thousands grouping and decimals.
const NUMBER: &str = r"(\d{1,3}(?:\.\d{3})+(?:,\d+)?|\d+(?:[.,]\d+)?)";

/// Synonyms consulted after the portal mapping; exact match on the whole value.
const GLOBAL_SYNONYMS: &[(&str, PropertyType)] = &[
    ("apartment", PropertyType::Apartment),
    ("wohnung", PropertyType::Apartment),
    ("flat", PropertyType::Apartment),
    ("appartement", PropertyType::Apartment),
    ("room", PropertyType::Room),
    ("zimmer", PropertyType::Room),
    ("wg-zimmer", PropertyType::Room),
    ("shared-room", PropertyType::Room),
    ("house", PropertyType::House),
    ("haus", PropertyType::House),
    ("villa", PropertyType::House),
    ("cottage", PropertyType::House),
    ("studio", PropertyType::Studio),
    ("1-zimmer", PropertyType::Studio),
    ("ein-zimmer", PropertyType::Studio),
];

/// Substring mappings in priority order; more specific terms come first.
const WG_TYPES: &[(&str, PropertyType)] = &[
    ("wg-zimmer", PropertyType::Room),
    ("1-zimmer", PropertyType::Studio),
    ("wohnung", PropertyType::Apartment),
    ("haus", PropertyType::House),
];

const IS24_TYPES: &[(&str, PropertyType)] = &[
    ("wg-zimmer", PropertyType::Room),
    ("1-zimmer", PropertyType::Studio),
    ("wohnung", PropertyType::Apartment),
    ("haus", PropertyType::House),
    ("zimmer", PropertyType::Room),
];

const COMMON_TYPES: &[(&str, PropertyType)] = &[
    ("wohnung", PropertyType::Apartment),
    ("haus", PropertyType::House),
    ("zimmer", PropertyType::Room),
];

/// Compiled rules for one portal.
#[derive(Debug)]
pub struct NormalizationProfile {
    pub price: Vec<Regex>,
    pub area: Vec<Regex>,
    pub rooms: Vec<Regex>,
    pub types: &'static [(&'static str, PropertyType)],
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

impl NormalizationProfile {
    pub fn for_portal(portal: Portal) -> Result<Self, regex::Error> {
        let euro = format!(r"(?i){NUMBER}\s*(?:,-\s*)?€");
        let euro_word = format!(r"(?i){NUMBER}\s*(?:,-\s*)?(?:euro|eur)\b");
        let sqm = format!(r"(?i){NUMBER}\s*m²");
        let sqm_ascii = format!(r"(?i){NUMBER}\s*(?:m2|qm)\b");
        let zimmer = r"(?i)(\d+(?:[.,]\d+)?)\s*-?\s*zimmer".to_string();
        let zi = r"(?i)(\d+(?:[.,]\d+)?)\s*-?\s*zi\b".to_string();

        let profile = match portal {
            Portal::WgGesucht => Self {
                price: compile(&[euro, euro_word])?,
                area: compile(&[sqm, sqm_ascii])?,
                rooms: compile(&[zimmer, zi])?,
                types: WG_TYPES,
            },
            Portal::ImmobilienScout24 => Self {
                price: compile(&[euro])?,
                area: compile(&[sqm, sqm_ascii])?,
                rooms: compile(&[zimmer])?,
                types: IS24_TYPES,
            },
            Portal::Immowelt | Portal::Kleinanzeigen | Portal::Immonet => Self {
                price: compile(&[euro])?,
                area: compile(&[sqm])?,
                rooms: compile(&[zimmer])?,
                types: COMMON_TYPES,
            },
        };
        Ok(profile)
    }

    /// Portal mapping by substring, then global synonyms by exact value.
    pub fn property_type(&self, text: &str) -> Option<PropertyType> {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        self.types
            .iter()
            .find(|(needle, _)| lower.contains(needle))
            .or_else(|| GLOBAL_SYNONYMS.iter().find(|(name, _)| *name == lower))
            .map(|(_, kind)| *kind)
    }
}

/// Portal-independent fallbacks tried after a profile's own patterns.
#[derive(Debug)]
pub struct Fallbacks {
    /// Any amount followed by a currency mark or a trailing `,-`.
    pub price: Vec<Regex>,
    /// Leading number of a bare value.
    pub leading_number: Regex,
}

impl Fallbacks {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            price: compile(&[format!(r"(?i){NUMBER}\s*(?:€|eur\b|euro)"), format!(r"{NUMBER}\s*,-")])?,
            leading_number: Regex::new(r"^\s*(\d+(?:[.,]\d+)?)")?,
        })
    }
}
