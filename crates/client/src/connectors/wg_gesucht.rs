//! WG-Gesucht: shared flats and small apartments.

use std::time::Duration;

use rentwire_core::model::raw::field;
use rentwire_core::{Portal, PropertyTypeFilter, SearchCriteria};
use url::Url;

use super::extract::{FieldRule, SelectorTable, Source};
use super::{ConnectorError, PortalProfile, portal_url};

const RATE_LIMIT: Duration = Duration::from_millis(3000);

/// City used when the criteria name none.
const DEFAULT_CITY_ID: u32 = 8;

/// Portal city ids, keyed by lowercase name and its transliterations.
const CITY_IDS: &[(&str, u32)] = &[
    ("berlin", 8),
    ("hamburg", 55),
    ("münchen", 90),
    ("muenchen", 90),
    ("munich", 90),
    ("köln", 73),
    ("koeln", 73),
    ("cologne", 73),
    ("frankfurt am main", 41),
    ("frankfurt", 41),
];

pub static SELECTORS: SelectorTable = SelectorTable {
    items: &[".offer_list_item", ".listitem", ".wgg_card", r#"[id^="liste-"]"#, ".panel-body .row"],
    fields: &[
        FieldRule {
            field: field::TITLE,
            selectors: &[".headline", ".detailansicht a", "h3 a", ".card-title", "a[title]"],
            source: Source::Text,
        },
        FieldRule {
            field: field::PRICE,
            selectors: &[".rent", ".price", ".kosten", ".angaben .ang_spalte_mitte"],
            source: Source::Text,
        },
        FieldRule {
            field: field::LOCATION,
            selectors: &[".city", ".location", ".ort", ".angaben .ang_spalte_links"],
            source: Source::Text,
        },
        FieldRule { field: field::URL, selectors: &["a", ".headline a", ".detailansicht a"], source: Source::Attr(&["href"]) },
        FieldRule {
            field: field::IMAGE,
            selectors: &[".image img", ".gallery img", "img"],
            source: Source::Attr(&["src", "data-src"]),
        },
        FieldRule { field: field::DESCRIPTION, selectors: &[".freitext", ".description", ".text"], source: Source::Text },
    ],
    id_attributes: &["data-id", "id"],
    id_pattern: r"\.(\d+)\.html",
    fallback_links: "a[href]",
    fallback_keywords: &["€", "zimmer", "wohnung"],
};

pub fn profile() -> PortalProfile {
    PortalProfile {
        portal: Portal::WgGesucht,
        rate_limit: RATE_LIMIT,
        max_items: 50,
        max_fallback_items: 20,
        selectors: &SELECTORS,
        build_url,
    }
}

fn city_id(city: Option<&str>) -> Result<u32, ConnectorError> {
    let Some(city) = city.map(|c| c.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()) else {
        return Ok(DEFAULT_CITY_ID);
    };
    if city.is_empty() {
        return Ok(DEFAULT_CITY_ID);
    }

    CITY_IDS
        .iter()
        .find(|(name, _)| *name == city)
        .map(|(_, id)| *id)
        .ok_or_else(|| ConnectorError::InvalidCriteria(format!("wg-gesucht has no city id for {city:?}")))
}

fn category(filter: PropertyTypeFilter) -> &'static str {
    match filter {
        PropertyTypeFilter::Room => "0",
        PropertyTypeFilter::Studio => "1",
        PropertyTypeFilter::Apartment => "2",
        PropertyTypeFilter::House => "3",
        PropertyTypeFilter::Any => "0,1,2,3",
    }
}

/// `wohnraumangebote.html` query for `criteria`.
///
/// # Errors
///
/// Returns `ConnectorError::InvalidCriteria` for a city without a known id.
pub fn build_url(criteria: &SearchCriteria) -> Result<Url, ConnectorError> {
    let mut url = portal_url(Portal::WgGesucht, "wohnraumangebote.html")?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("city_id", &city_id(criteria.city.as_deref())?.to_string())
            .append_pair("rent_type", "0")
            .append_pair("category", category(criteria.property_type));

        if let Some(budget) = criteria.max_budget {
            query.append_pair("min_rent", "0").append_pair("max_rent", &format!("{budget:.0}"));
        }
        if let Some(rooms) = criteria.min_rooms.filter(|r| *r > 0) {
            query
                .append_pair("min_rooms", &rooms.to_string())
                .append_pair("max_rooms", &(u16::from(rooms) + 1).to_string());
        }
    }

    Ok(url)
}
