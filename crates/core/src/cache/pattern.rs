//! Wildcard key patterns for cache invalidation.
//!
//! Patterns use `*` as the only wildcard (`search:*berlin*`). The volatile
//! store matches them with a compiled regex; the durable store translates
//! them to a SQL `LIKE` expression. Cache keys are always lowercase, so
//! patterns are lowercased on construction and both stores agree on case.

use regex::Regex;

use crate::Error;

/// A compiled `*`-wildcard pattern over cache keys.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    regex: Regex,
}

impl KeyPattern {
    /// Compile a wildcard pattern, lowercased.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the pattern is empty.
    pub fn new(pattern: &str) -> Result<Self, Error> {
        if pattern.trim().is_empty() {
            return Err(Error::InvalidInput("invalidation pattern must not be empty".into()));
        }

        let pattern = pattern.to_lowercase();
        let body = pattern.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
        let regex = Regex::new(&format!("^{body}$")).map_err(|e| Error::InvalidInput(e.to_string()))?;

        Ok(Self { raw: pattern, regex })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `key` matches the pattern.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// `LIKE` operand equivalent to this pattern, for use with `ESCAPE '\'`.
    pub fn to_sql_like(&self) -> String {
        let mut out = String::with_capacity(self.raw.len());
        for c in self.raw.chars() {
            match c {
                '*' => out.push('%'),
                '%' | '_' | '\\' => {
                    out.push('\\');
                    out.push(c);
                }
                other => out.push(other),
            }
        }
        out
    }
}
