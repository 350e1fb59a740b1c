//! Immowelt: apartments and shared rooms.

use std::time::Duration;

use rentwire_core::model::raw::field;
use rentwire_core::{Portal, PropertyTypeFilter, SearchCriteria};
use url::Url;

use super::extract::{FieldRule, SelectorTable, Source};
use super::{ConnectorError, PortalProfile, city_slug, portal_url};

const RATE_LIMIT: Duration = Duration::from_millis(2000);

pub static SELECTORS: SelectorTable = SelectorTable {
    items: &[".listitem", ".listitem_wrap", r#"[data-test="result-item"]"#, ".result-item", ".estate-item"],
    fields: &[
        FieldRule {
            field: field::TITLE,
            selectors: &[".listitem_headline", ".headline", "h2 a", ".title", "a[title]"],
            source: Source::Text,
        },
        FieldRule { field: field::PRICE, selectors: &[".listitem_price", ".price", ".hardfact_price"], source: Source::Text },
        FieldRule {
            field: field::LOCATION,
            selectors: &[".listitem_address", ".address", ".location"],
            source: Source::Text,
        },
        FieldRule { field: field::URL, selectors: &[".listitem_headline a", "h2 a", "a"], source: Source::Attr(&["href"]) },
        FieldRule {
            field: field::IMAGE,
            selectors: &[".listitem_image img", ".estate-image img", "img"],
            source: Source::Attr(&["src", "data-src"]),
        },
    ],
    id_attributes: &["data-id"],
    id_pattern: r"/expose/(\w+)",
    fallback_links: "a[href]",
    fallback_keywords: &["€", "zimmer", "wohnung", "miete"],
};

pub fn profile() -> PortalProfile {
    PortalProfile {
        portal: Portal::Immowelt,
        rate_limit: RATE_LIMIT,
        max_items: 30,
        max_fallback_items: 10,
        selectors: &SELECTORS,
        build_url,
    }
}

fn list_kind(filter: PropertyTypeFilter) -> &'static str {
    match filter {
        PropertyTypeFilter::Room => "wg-zimmer",
        PropertyTypeFilter::Apartment | PropertyTypeFilter::Studio | PropertyTypeFilter::House | PropertyTypeFilter::Any => {
            "wohnung-mieten"
        }
    }
}

/// `liste/{kind}/{city}` URL for `criteria`.
pub fn build_url(criteria: &SearchCriteria) -> Result<Url, ConnectorError> {
    let kind = list_kind(criteria.property_type);
    let path = match criteria.city.as_deref().map(city_slug).filter(|s| !s.is_empty()) {
        Some(slug) => format!("liste/{kind}/{slug}"),
        None => format!("liste/{kind}"),
    };

    portal_url(Portal::Immowelt, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::extract::{CompiledTable, ExtractContext, Strategy};

    #[test]
    fn test_url_for_room_and_apartment() {
        let room = SearchCriteria { property_type: PropertyTypeFilter::Room, ..SearchCriteria::for_city("Köln") };
        assert_eq!(build_url(&room).unwrap().as_str(), "https://www.immowelt.de/liste/wg-zimmer/koeln");

        let any = SearchCriteria::for_city("Frankfurt am Main");
        assert_eq!(build_url(&any).unwrap().as_str(), "https://www.immowelt.de/liste/wohnung-mieten/frankfurt-am-main");
    }

    #[test]
    fn test_url_without_city() {
        let url = build_url(&SearchCriteria::default()).unwrap();
        assert_eq!(url.as_str(), "https://www.immowelt.de/liste/wohnung-mieten");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_selectors_match_list_items() {
        let html = r#"
            <div class="listitem_wrap">
              <div class="listitem">
                <div class="listitem_headline"><a href="/expose/2kx7q4">Helle 2-Zimmer-Wohnung</a></div>
                <div class="listitem_price">890 €</div>
                <div class="listitem_address">Ehrenfeld, Köln</div>
                <div class="listitem_image"><img src="https://ms.immowelt.org/2kx7q4.jpg"></div>
              </div>
            </div>
        "#;
        let table = CompiledTable::compile(&SELECTORS).unwrap();
        let ctx = ExtractContext { limit: 30, fallback_limit: 10, city: Some("Köln"), type_hint: None };
        let extraction = table.extract(html, &ctx);

        assert_eq!(extraction.strategy, Strategy::Structured { selector: ".listitem" });
        let raw = &extraction.listings[0];
        assert_eq!(raw.get(field::TITLE), Some("Helle 2-Zimmer-Wohnung"));
        assert_eq!(raw.get(field::URL), Some("/expose/2kx7q4"));
        assert_eq!(raw.get(field::PRICE), Some("890 €"));
        assert_eq!(raw.get(field::LOCATION), Some("Ehrenfeld, Köln"));
        assert_eq!(raw.get(field::IMAGE), Some("https://ms.immowelt.org/2kx7q4.jpg"));
        assert_eq!(raw.get(field::EXTERNAL_ID), Some("2kx7q4"));
    }

    #[test]
    fn test_fallback_keeps_priced_links() {
        let html = r#"
            <a href="/impressum">Impressum</a>
            <a href="/expose/9zz">Wohnung 650 €</a>
        "#;
        let table = CompiledTable::compile(&SELECTORS).unwrap();
        let ctx = ExtractContext { limit: 30, fallback_limit: 10, city: None, type_hint: None };
        let extraction = table.extract(html, &ctx);

        assert_eq!(extraction.strategy, Strategy::LinkHeuristic);
        assert_eq!(extraction.listings.len(), 1);
        assert_eq!(extraction.listings[0].get(field::EXTERNAL_ID), Some("9zz"));
    }
}
