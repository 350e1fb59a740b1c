//! Immonet: rental search through the `sel.do` query endpoint.

use std::time::Duration;

use rentwire_core::model::raw::field;
use rentwire_core::{Portal, SearchCriteria};
use url::Url;

use super::extract::{FieldRule, SelectorTable, Source};
use super::{ConnectorError, PortalProfile, portal_url};

const RATE_LIMIT: Duration = Duration::from_millis(2000);

/// Search kind "rent".
const SUCHART_RENT: &str = "1";
/// Object kind "apartment"; the portal lists rooms under it as well.
const OBJEKTART_APARTMENT: &str = "1";

pub static SELECTORS: SelectorTable = SelectorTable {
    items: &[".item", ".search-item", ".result-item", ".property-item", "[data-item]"],
    fields: &[
        FieldRule {
            field: field::TITLE,
            selectors: &[".item-title", ".title", "h2 a", "h3 a", "a[title]"],
            source: Source::Text,
        },
        FieldRule { field: field::PRICE, selectors: &[".item-price", ".price", ".rent-price"], source: Source::Text },
        FieldRule { field: field::LOCATION, selectors: &[".item-address", ".address", ".location"], source: Source::Text },
        FieldRule {
            field: field::URL,
            selectors: &[".item-title a", "h2 a", "h3 a", "a"],
            source: Source::Attr(&["href"]),
        },
        FieldRule {
            field: field::IMAGE,
            selectors: &[".item-image img", ".property-image img", "img"],
            source: Source::Attr(&["src", "data-src"]),
        },
    ],
    id_attributes: &["data-id"],
    id_pattern: r"/angebot/(\d+)",
    fallback_links: "a[href]",
    fallback_keywords: &["€", "zimmer", "wohnung", "miete"],
};

pub fn profile() -> PortalProfile {
    PortalProfile {
        portal: Portal::Immonet,
        rate_limit: RATE_LIMIT,
        max_items: 30,
        max_fallback_items: 10,
        selectors: &SELECTORS,
        build_url,
    }
}

/// `immobiliensuche/sel.do` query for `criteria`. The city is passed as typed.
pub fn build_url(criteria: &SearchCriteria) -> Result<Url, ConnectorError> {
    let mut url = portal_url(Portal::Immonet, "immobiliensuche/sel.do")?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("suchart", SUCHART_RENT).append_pair("objektart", OBJEKTART_APARTMENT);

        let city = criteria.city.as_deref().map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "));
        if let Some(city) = city.filter(|c| !c.is_empty()) {
            query.append_pair("city", &city);
        }
    }

    Ok(url)
}
