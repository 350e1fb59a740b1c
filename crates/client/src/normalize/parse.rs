//! Value parsers shared by all portal profiles.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;

/// Longest cleaned text kept on a listing.
pub const MAX_TEXT_CHARS: usize = 1000;

/// Trim, collapse whitespace and truncate to [`MAX_TEXT_CHARS`].
pub fn clean_text(text: Option<&str>) -> Option<String> {
    let collapsed = text?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(MAX_TEXT_CHARS).collect())
}

/// Parse a number written with German or English separators.
///
/// `"1.250,50"` and `"1,250.50"` are both 1250.5; a lone dot followed by
/// groups of exactly three digits is a thousands separator (`"1.250"`), a
/// lone comma is always a decimal separator (`"12,5"`).
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    let normalized = match (text.rfind('.'), text.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => text.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => text.replace(',', ""),
        (None, Some(_)) => text.replace(',', "."),
        (Some(_), None) => {
            let mut groups = text.split('.');
            let head = groups.next().unwrap_or_default();
            let rest: Vec<&str> = groups.collect();
            if head.len() <= 3 && rest.iter().all(|g| g.len() == 3) {
                text.replace('.', "")
            } else {
                text.to_string()
            }
        }
        (None, None) => text.to_string(),
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// First capture of the first pattern that matches, parsed as a number.
pub fn first_number(patterns: &[Regex], text: &str) -> Option<f64> {
    patterns.iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        parse_number(caps.get(1)?.as_str())
    })
}

/// Tri-state flag from the usual yes/no spellings.
pub fn parse_bool(value: Option<&str>) -> Option<bool> {
    match value?.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" | "ja" | "sí" | "si" => Some(true),
        "no" | "false" | "0" | "nein" => Some(false),
        _ => None,
    }
}

/// Compiled date patterns.
#[derive(Debug)]
pub struct DateParser {
    german: Regex,
    iso_day: Regex,
}

impl DateParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            german: Regex::new(r"\b(\d{1,2})\.(\d{1,2})\.(\d{4}|\d{2})\b")?,
            iso_day: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b")?,
        })
    }

    /// Parse a publication date; relative words resolve against `now`'s day.
    ///
    /// Accepts RFC 3339, `dd.mm.yyyy`, `dd.mm.yy`, `yyyy-mm-dd` (also inside
    /// longer text such as "Online seit 12.03.2024"), and heute/today,
    /// gestern/yesterday. Dates land on midnight UTC.
    pub fn parse(&self, value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(parsed.with_timezone(&Utc));
        }

        let lower = value.to_lowercase();
        let today = now.date_naive();
        if lower.contains("heute") || lower.contains("today") {
            return midnight(today);
        }
        if lower.contains("gestern") || lower.contains("yesterday") {
            return midnight(today - Duration::days(1));
        }

        if let Some(caps) = self.german.captures(value) {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let year: i32 = match caps[3].len() {
                2 => 2000 + caps[3].parse::<i32>().ok()?,
                _ => caps[3].parse().ok()?,
            };
            return midnight(NaiveDate::from_ymd_opt(year, month, day)?);
        }

        if let Some(caps) = self.iso_day.captures(value) {
            let date = NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)?;
            return midnight(date);
        }

        None
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}
