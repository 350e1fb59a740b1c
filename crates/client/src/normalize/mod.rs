//! Raw-to-canonical listing normalization.
//!
//! [`Normalizer::normalize`] maps one [`RawListing`] from a known portal to a
//! [`Listing`] or nothing. It performs no I/O; the clock is consulted only for
//! relative dates and for the id fallback of records with neither an external
//! id nor a URL (which are dropped anyway, since a URL is required).

pub mod parse;
pub mod profile;

use std::collections::HashMap;
use std::sync::Arc;

use rentwire_core::cache::hash::listing_hash;
use rentwire_core::model::raw::field;
use rentwire_core::{Clock, Error, Features, Listing, Portal, Price, PropertyType, RawListing};

use crate::fetch::absolutize;
use parse::{DateParser, clean_text, first_number, parse_bool, parse_number};
use profile::{Fallbacks, NormalizationProfile};

/// Plausible living area in square metres for unlabeled numbers.
const AREA_RANGE: std::ops::RangeInclusive<f64> = 10.0..=1000.0;
const ROOMS_RANGE: std::ops::RangeInclusive<f64> = 1.0..=20.0;

/// Output of [`Normalizer::normalize_batch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub listings: Vec<Listing>,
    /// Records dropped for missing url or title.
    pub dropped: usize,
}

/// Compiled normalization rules for every portal.
#[derive(Debug)]
pub struct Normalizer {
    profiles: HashMap<Portal, NormalizationProfile>,
    fallbacks: Fallbacks,
    dates: DateParser,
    clock: Arc<dyn Clock>,
}

fn setup_error(e: regex::Error) -> Error {
    Error::Internal(format!("normalizer pattern failed to compile: {e}"))
}

impl Normalizer {
    /// Compile the rule tables of all portals.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if a built-in pattern fails to compile.
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let profiles = Portal::ALL
            .into_iter()
            .map(|portal| NormalizationProfile::for_portal(portal).map(|profile| (portal, profile)))
            .collect::<Result<HashMap<_, _>, _>>()
            .map_err(setup_error)?;

        Ok(Self {
            profiles,
            fallbacks: Fallbacks::new().map_err(setup_error)?,
            dates: DateParser::new().map_err(setup_error)?,
            clock,
        })
    }

    /// Normalize one record; `None` if it lacks a resolvable url or a title.
    pub fn normalize(&self, raw: &RawListing, portal: Portal) -> Option<Listing> {
        let profile = self.profiles.get(&portal)?;
        let base = portal.base_url();

        let url = raw.get(field::URL).and_then(|u| absolutize(u, base))?.to_string();
        let title = clean_text(raw.get(field::TITLE))?;

        let external_id = raw.get(field::EXTERNAL_ID).map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        let basis = match &external_id {
            Some(id) => id.clone(),
            None => url.clone(),
        };

        let property_type = raw
            .get(field::TYPE)
            .and_then(|t| profile.property_type(t))
            .or_else(|| profile.property_type(&title))
            .unwrap_or(PropertyType::Apartment);

        Some(Listing {
            id: format!("{}:{}", portal.id(), listing_hash(portal.id(), &basis)),
            source: portal,
            external_id,
            url,
            title,
            price: self.price(profile, raw.get(field::PRICE)),
            area_sqm: self.area(profile, raw),
            main_image: raw.get(field::IMAGE).and_then(|i| absolutize(i, base)).map(|u| u.to_string()),
            location: clean_text(raw.get(field::LOCATION)),
            property_type,
            published_at: raw.get(field::PUBLISHED).and_then(|d| self.dates.parse(d, self.clock.now())),
            rooms: self.rooms(profile, raw),
            features: Features {
                parking: parse_bool(raw.get(field::PARKING)),
                balcony: parse_bool(raw.get(field::BALCONY)),
                garden: parse_bool(raw.get(field::GARDEN)),
                elevator: parse_bool(raw.get(field::ELEVATOR)),
                furnished: parse_bool(raw.get(field::FURNISHED)),
            },
            description: clean_text(raw.get(field::DESCRIPTION)),
        })
    }

    /// Normalize every record of one portal, counting drops.
    pub fn normalize_batch(&self, raws: &[RawListing], portal: Portal) -> NormalizedBatch {
        let listings: Vec<Listing> = raws.iter().filter_map(|raw| self.normalize(raw, portal)).collect();
        let dropped = raws.len() - listings.len();

        if dropped > 0 {
            tracing::warn!(portal = portal.id(), dropped, total = raws.len(), "Dropped malformed listings");
        }

        NormalizedBatch { listings, dropped }
    }

    fn price(&self, profile: &NormalizationProfile, text: Option<&str>) -> Option<Price> {
        let text = text?;
        first_number(&profile.price, text)
            .or_else(|| first_number(&self.fallbacks.price, text))
            .filter(|amount| *amount >= 0.0)
            .map(Price::eur)
    }

    fn area(&self, profile: &NormalizationProfile, raw: &RawListing) -> Option<f64> {
        if let Some(text) = raw.get(field::AREA) {
            let labeled = first_number(&profile.area, text);
            let bare = || self.leading_number(text).filter(|n| AREA_RANGE.contains(n));
            if let Some(area) = labeled.or_else(bare) {
                return Some(area);
            }
        }

        [field::SUMMARY, field::TITLE]
            .into_iter()
            .filter_map(|key| raw.get(key))
            .find_map(|text| first_number(&profile.area, text))
    }

    fn rooms(&self, profile: &NormalizationProfile, raw: &RawListing) -> Option<u8> {
        let labeled = |text: &str| first_number(&profile.rooms, text);

        let from_field = raw.get(field::ROOMS).and_then(|text| labeled(text).or_else(|| self.leading_number(text)));
        let count = from_field.or_else(|| {
            [field::SUMMARY, field::TITLE]
                .into_iter()
                .filter_map(|key| raw.get(key))
                .find_map(labeled)
        })?;

        let count = count.trunc();
        ROOMS_RANGE.contains(&count).then_some(count as u8)
    }

    fn leading_number(&self, text: &str) -> Option<f64> {
        let caps = self.fallbacks.leading_number.captures(text)?;
        parse_number(caps.get(1)?.as_str())
    }
}
