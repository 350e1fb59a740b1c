//! Translation collaborator used to localize the city term of a search.

use std::fmt::Debug;

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("translation backend unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported language pair {from}->{to}")]
    UnsupportedPair { from: String, to: String },
}

/// Free-text translation.
///
/// Callers fall back to the original text on any error.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslateError>;
}
