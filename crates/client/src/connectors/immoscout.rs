//! ImmobilienScout24: apartments and houses.

use std::time::Duration;

use rentwire_core::model::raw::field;
use rentwire_core::{Portal, PropertyTypeFilter, SearchCriteria};
use url::Url;

use super::extract::{FieldRule, SelectorTable, Source};
use super::{ConnectorError, PortalProfile, city_slug, portal_url};

const RATE_LIMIT: Duration = Duration::from_millis(2500);

pub static SELECTORS: SelectorTable = SelectorTable {
    items: &[
        ".result-list-entry",
        ".result-list__listing",
        r#"[data-item="result"]"#,
        ".resultlist-entry",
        ".result-item",
    ],
    fields: &[
        FieldRule {
            field: field::TITLE,
            selectors: &[".result-list-entry__brand-title", ".result-list-entry__title", "h2 a", ".title", "a[title]"],
            source: Source::Text,
        },
        FieldRule {
            field: field::PRICE,
            selectors: &[
                ".result-list-entry__primary-criterion",
                ".price",
                ".result-list-entry__price",
                ".criterion__value",
            ],
            source: Source::Text,
        },
        FieldRule {
            field: field::LOCATION,
            selectors: &[".result-list-entry__address", ".address", ".location"],
            source: Source::Text,
        },
        FieldRule {
            field: field::URL,
            selectors: &[".result-list-entry__brand-title", "h2 a", "a"],
            source: Source::Attr(&["href"]),
        },
        FieldRule {
            field: field::IMAGE,
            selectors: &[".result-list-entry__image img", ".gallery-image img", "img"],
            source: Source::Attr(&["src", "data-src", "data-lazy-src"]),
        },
        FieldRule {
            field: field::PUBLISHED,
            selectors: &[".result-list-entry__date", ".date", "time"],
            source: Source::Text,
        },
        FieldRule { field: field::DESCRIPTION, selectors: &[".result-list-entry__description"], source: Source::Text },
    ],
    id_attributes: &["data-id", "data-obid"],
    id_pattern: r"/expose/(\d+)",
    fallback_links: r#"a[href*="expose"]"#,
    fallback_keywords: &[],
};

pub fn profile() -> PortalProfile {
    PortalProfile {
        portal: Portal::ImmobilienScout24,
        rate_limit: RATE_LIMIT,
        max_items: 50,
        max_fallback_items: 20,
        selectors: &SELECTORS,
        build_url,
    }
}

fn search_kind(filter: PropertyTypeFilter) -> &'static str {
    match filter {
        PropertyTypeFilter::Room => "wg-zimmer",
        PropertyTypeFilter::House => "haus-mieten",
        PropertyTypeFilter::Apartment | PropertyTypeFilter::Studio | PropertyTypeFilter::Any => "wohnung-mieten",
    }
}

/// `Suche/de/{kind}/{city}` URL for `criteria`.
pub fn build_url(criteria: &SearchCriteria) -> Result<Url, ConnectorError> {
    let kind = search_kind(criteria.property_type);
    let path = match criteria.city.as_deref().map(city_slug).filter(|s| !s.is_empty()) {
        Some(slug) => format!("Suche/de/{kind}/{slug}"),
        None => format!("Suche/de/{kind}"),
    };

    let mut url = portal_url(Portal::ImmobilienScout24, &path)?;

    let rooms = criteria.min_rooms.filter(|r| *r > 0);
    if criteria.max_budget.is_some() || rooms.is_some() {
        let mut query = url.query_pairs_mut();
        if let Some(budget) = criteria.max_budget {
            query.append_pair("priceTo", &format!("{budget:.0}"));
        }
        // Lower bound only; min_rooms is a minimum, not an exact count.
        if let Some(rooms) = rooms {
            query.append_pair("numberOfRoomsFrom", &rooms.to_string());
        }
    }

    Ok(url)
}
