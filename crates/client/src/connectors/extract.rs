//! Selector-strategy extraction of raw listings from result pages.
//!
//! Item selectors are tried in priority order; the first one that yields at
//! least one record wins. If none does, a generic link heuristic runs over
//! every anchor on the page.

use std::collections::HashSet;

use regex::Regex;
use rentwire_core::RawListing;
use rentwire_core::model::raw::field;
use scraper::{ElementRef, Html, Selector};

use super::ConnectorError;

/// Where a field's value is read from.
#[derive(Debug, Clone, Copy)]
pub enum Source {
    /// Whitespace-collapsed text content.
    Text,
    /// First non-empty attribute among the listed names.
    Attr(&'static [&'static str]),
}

/// One output field and its ordered selector candidates.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub selectors: &'static [&'static str],
    pub source: Source,
}

/// Static selector configuration of a portal.
#[derive(Debug)]
pub struct SelectorTable {
    /// Item container selectors, highest priority first.
    pub items: &'static [&'static str],
    pub fields: &'static [FieldRule],
    /// Item attributes that may carry the portal's ad id.
    pub id_attributes: &'static [&'static str],
    /// Regex with one capture group pulling the ad id out of a detail URL.
    pub id_pattern: &'static str,
    /// Anchor selector for the link heuristic.
    pub fallback_links: &'static str,
    /// Lowercase needles a fallback link's text must contain; empty accepts any text.
    pub fallback_keywords: &'static [&'static str],
}

#[derive(Debug)]
struct CompiledField {
    field: &'static str,
    selectors: Vec<Selector>,
    source: Source,
}

/// A [`SelectorTable`] with every selector and pattern parsed.
#[derive(Debug)]
pub struct CompiledTable {
    items: Vec<(&'static str, Selector)>,
    fields: Vec<CompiledField>,
    id_attributes: &'static [&'static str],
    id_pattern: Regex,
    fallback_links: Selector,
    fallback_keywords: &'static [&'static str],
}

fn parse_selector(css: &str) -> Result<Selector, ConnectorError> {
    Selector::parse(css).map_err(|e| ConnectorError::Setup(format!("invalid selector {css:?}: {e}")))
}

impl CompiledTable {
    /// Parse all selectors of `table`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Setup` on the first invalid selector or id pattern.
    pub fn compile(table: &SelectorTable) -> Result<Self, ConnectorError> {
        let items = table
            .items
            .iter()
            .map(|css| parse_selector(css).map(|s| (*css, s)))
            .collect::<Result<Vec<_>, _>>()?;

        let fields = table
            .fields
            .iter()
            .map(|rule| {
                let selectors = rule.selectors.iter().copied().map(parse_selector).collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledField { field: rule.field, selectors, source: rule.source })
            })
            .collect::<Result<Vec<_>, ConnectorError>>()?;

        let id_pattern = Regex::new(table.id_pattern)
            .map_err(|e| ConnectorError::Setup(format!("invalid id pattern {:?}: {e}", table.id_pattern)))?;

        Ok(Self {
            items,
            fields,
            id_attributes: table.id_attributes,
            id_pattern,
            fallback_links: parse_selector(table.fallback_links)?,
            fallback_keywords: table.fallback_keywords,
        })
    }
}

/// Per-call extraction inputs.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    /// Maximum structured records.
    pub limit: usize,
    /// Maximum heuristic records.
    pub fallback_limit: usize,
    /// City searched for; used when an item carries no location.
    pub city: Option<&'a str>,
    /// Property type searched for, stored as the raw type hint.
    pub type_hint: Option<&'a str>,
}

/// Which strategy produced the records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Item selector at this priority position.
    Structured { selector: &'static str },
    LinkHeuristic,
    Empty,
}

#[derive(Debug)]
pub struct Extraction {
    pub listings: Vec<RawListing>,
    pub strategy: Strategy,
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_value(element: ElementRef<'_>, rule: &CompiledField) -> Option<String> {
    rule.selectors.iter().find_map(|selector| {
        let found = element.select(selector).next()?;
        let value = match rule.source {
            Source::Text => element_text(found),
            Source::Attr(names) => names.iter().find_map(|name| found.value().attr(name)).unwrap_or("").trim().to_string(),
        };
        (!value.is_empty()).then_some(value)
    })
}

impl CompiledTable {
    fn external_id(&self, element: ElementRef<'_>, url: Option<&str>) -> Option<String> {
        let from_attr = self.id_attributes.iter().find_map(|name| {
            let value = element.value().attr(name)?;
            let digits: String = value.chars().filter(char::is_ascii_digit).collect();
            (!digits.is_empty()).then_some(digits)
        });

        from_attr.or_else(|| {
            let caps = self.id_pattern.captures(url?)?;
            caps.get(1).map(|m| m.as_str().to_string())
        })
    }

    fn structured_record(&self, element: ElementRef<'_>, ctx: &ExtractContext<'_>) -> Option<RawListing> {
        let mut raw = RawListing::new();
        for rule in &self.fields {
            raw.set(rule.field, first_value(element, rule));
        }

        if !raw.contains(field::TITLE) && !raw.contains(field::URL) {
            return None;
        }

        let id = self.external_id(element, raw.get(field::URL));
        raw.set(field::EXTERNAL_ID, id);
        raw.set(field::SUMMARY, Some(element_text(element)));
        if !raw.contains(field::LOCATION) {
            raw.set(field::LOCATION, ctx.city);
        }
        raw.set(field::TYPE, ctx.type_hint);
        Some(raw)
    }

    fn heuristic_records(&self, document: &Html, ctx: &ExtractContext<'_>) -> Vec<RawListing> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let cap = ctx.fallback_limit.min(ctx.limit);

        for anchor in document.select(&self.fallback_links) {
            if out.len() >= cap {
                break;
            }

            let Some(href) = anchor.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
                continue;
            };
            let text = element_text(anchor);
            if text.is_empty() {
                continue;
            }

            let lower = text.to_lowercase();
            if !self.fallback_keywords.is_empty() && !self.fallback_keywords.iter().any(|k| lower.contains(k)) {
                continue;
            }
            if !seen.insert(href.to_string()) {
                continue;
            }

            let title: String = text.chars().take(100).collect();
            let mut raw = RawListing::new()
                .with(field::TITLE, title)
                .with(field::URL, href)
                .with(field::PRICE, text.as_str())
                .with(field::SUMMARY, text.as_str());
            raw.set(field::EXTERNAL_ID, self.id_pattern.captures(href).and_then(|c| c.get(1)).map(|m| m.as_str()));
            raw.set(field::LOCATION, ctx.city);
            raw.set(field::TYPE, ctx.type_hint);
            out.push(raw);
        }

        out
    }

    /// Extract raw listings from a result page.
    pub fn extract(&self, html: &str, ctx: &ExtractContext<'_>) -> Extraction {
        let document = Html::parse_document(html);

        for (css, selector) in &self.items {
            let listings: Vec<RawListing> = document
                .select(selector)
                .filter_map(|item| self.structured_record(item, ctx))
                .take(ctx.limit)
                .collect();

            if !listings.is_empty() {
                return Extraction { listings, strategy: Strategy::Structured { selector: *css } };
            }
        }

        let listings = self.heuristic_records(&document, ctx);
        let strategy = if listings.is_empty() { Strategy::Empty } else { Strategy::LinkHeuristic };
        Extraction { listings, strategy }
    }
}
