//! Kleinanzeigen: classifieds for rooms and apartments.

use std::time::Duration;

use rentwire_core::model::raw::field;
use rentwire_core::{Portal, PropertyTypeFilter, SearchCriteria};
use url::Url;

use super::extract::{FieldRule, SelectorTable, Source};
use super::{ConnectorError, PortalProfile, city_slug, portal_url};

const RATE_LIMIT: Duration = Duration::from_millis(2000);

pub static SELECTORS: SelectorTable = SelectorTable {
    items: &[".ad-listitem", ".aditem", ".aditem-main", "[data-adid]", ".ad-item"],
    fields: &[
        FieldRule {
            field: field::TITLE,
            selectors: &[".text-module-begin a", ".aditem-main--middle--title", "h2 a", ".ad-title", "a[title]"],
            source: Source::Text,
        },
        FieldRule {
            field: field::PRICE,
            selectors: &[".aditem-main--middle--price", ".price", ".ad-price", ".text-module-end"],
            source: Source::Text,
        },
        FieldRule {
            field: field::LOCATION,
            selectors: &[".aditem-main--top--left", ".aditem-details", ".location", ".ad-location"],
            source: Source::Text,
        },
        FieldRule {
            field: field::URL,
            selectors: &[".text-module-begin a", "h2 a", "a", ".ad-title a"],
            source: Source::Attr(&["href"]),
        },
        FieldRule {
            field: field::IMAGE,
            selectors: &[".imagebox img", ".aditem-image img", "img"],
            source: Source::Attr(&["src", "data-imgsrc"]),
        },
        FieldRule { field: field::DESCRIPTION, selectors: &[".aditem-addon", ".description"], source: Source::Text },
    ],
    id_attributes: &["data-adid"],
    id_pattern: r"/s-anzeige/[^/]+/(\d+)",
    fallback_links: "a[href]",
    fallback_keywords: &["€", "zimmer", "wohnung", "miete"],
};

pub fn profile() -> PortalProfile {
    PortalProfile {
        portal: Portal::Kleinanzeigen,
        rate_limit: RATE_LIMIT,
        max_items: 30,
        max_fallback_items: 10,
        selectors: &SELECTORS,
        build_url,
    }
}

/// Category path and id: rooms live in c199, everything else in c203.
fn category(filter: PropertyTypeFilter) -> (&'static str, &'static str) {
    match filter {
        PropertyTypeFilter::Room => ("s-zimmer", "c199"),
        PropertyTypeFilter::Apartment | PropertyTypeFilter::Studio | PropertyTypeFilter::House | PropertyTypeFilter::Any => {
            ("s-wohnung-mieten", "c203")
        }
    }
}

/// `{category}/{city}/{id}` URL for `criteria`.
pub fn build_url(criteria: &SearchCriteria) -> Result<Url, ConnectorError> {
    let (kind, id) = category(criteria.property_type);
    let path = match criteria.city.as_deref().map(city_slug).filter(|s| !s.is_empty()) {
        Some(slug) => format!("{kind}/{slug}/{id}"),
        None => format!("{kind}/{id}"),
    };

    portal_url(Portal::Kleinanzeigen, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::extract::{CompiledTable, ExtractContext, Strategy};

    #[test]
    fn test_url_per_category() {
        let room = SearchCriteria { property_type: PropertyTypeFilter::Room, ..SearchCriteria::for_city("Berlin") };
        assert_eq!(build_url(&room).unwrap().as_str(), "https://www.kleinanzeigen.de/s-zimmer/berlin/c199");

        let flat = SearchCriteria { property_type: PropertyTypeFilter::Apartment, ..SearchCriteria::for_city("München") };
        assert_eq!(build_url(&flat).unwrap().as_str(), "https://www.kleinanzeigen.de/s-wohnung-mieten/muenchen/c203");
    }

    #[test]
    fn test_url_without_city() {
        let url = build_url(&SearchCriteria::default()).unwrap();
        assert_eq!(url.as_str(), "https://www.kleinanzeigen.de/s-wohnung-mieten/c203");
    }

    #[test]
    fn test_selectors_match_ad_list() {
        let html = r#"
            <ul id="srchrslt-adtable">
              <li class="ad-listitem">
                <article class="aditem" data-adid="2798765432">
                  <div class="aditem-image"><div class="imagebox"><img src="https://img.kleinanzeigen.de/1.jpg"></div></div>
                  <div class="aditem-main">
                    <div class="aditem-main--top--left">10997 Kreuzberg</div>
                    <h2 class="text-module-begin"><a href="/s-anzeige/wg-zimmer-kreuzberg/2798765432-199-3375">WG-Zimmer 16 m²</a></h2>
                    <p class="aditem-main--middle--price">520 € VB</p>
                    <p class="aditem-addon">Heute, 09:12</p>
                  </div>
                </article>
              </li>
            </ul>
        "#;
        let table = CompiledTable::compile(&SELECTORS).unwrap();
        let ctx = ExtractContext { limit: 30, fallback_limit: 10, city: Some("Berlin"), type_hint: Some("room") };
        let extraction = table.extract(html, &ctx);

        assert_eq!(extraction.strategy, Strategy::Structured { selector: ".ad-listitem" });
        let raw = &extraction.listings[0];
        assert_eq!(raw.get(field::TITLE), Some("WG-Zimmer 16 m²"));
        assert_eq!(raw.get(field::URL), Some("/s-anzeige/wg-zimmer-kreuzberg/2798765432-199-3375"));
        assert_eq!(raw.get(field::PRICE), Some("520 € VB"));
        assert_eq!(raw.get(field::LOCATION), Some("10997 Kreuzberg"));
        assert_eq!(raw.get(field::IMAGE), Some("https://img.kleinanzeigen.de/1.jpg"));
        assert_eq!(raw.get(field::EXTERNAL_ID), Some("2798765432"));
        assert_eq!(raw.get(field::TYPE), Some("room"));
    }

    #[test]
    fn test_fallback_requires_keyword() {
        let html = r#"
            <a href="/s-anzeigen/meins">Meine Anzeigen</a>
            <a href="/s-anzeige/zimmer-frei/1234-199-1">Zimmer frei ab sofort</a>
            <a href="/s-anzeige/zimmer-frei/1234-199-1">Zimmer frei ab sofort</a>
        "#;
        let table = CompiledTable::compile(&SELECTORS).unwrap();
        let ctx = ExtractContext { limit: 30, fallback_limit: 10, city: Some("Berlin"), type_hint: None };
        let extraction = table.extract(html, &ctx);

        assert_eq!(extraction.strategy, Strategy::LinkHeuristic);
        assert_eq!(extraction.listings.len(), 1);
        assert_eq!(extraction.listings[0].get(field::EXTERNAL_ID), Some("1234"));
        assert_eq!(extraction.listings[0].get(field::LOCATION), Some("Berlin"));
    }
}
