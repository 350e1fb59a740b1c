//! HTTP fetch pipeline for portal requests.
//!
//! ### Transport
//! - All network access goes through [`HttpTransport`]; [`ReqwestTransport`]
//!   is the production implementation (rustls, gzip/brotli/deflate).
//! - Max redirects: 5
//! - Max body bytes: 5MB
//!
//! ### Retry
//! - [`RequestExecutor`] retries non-2xx responses and transport failures
//!   with exponential backoff (`base * 2^(attempt-1)`), sleeping through the
//!   injected clock.
//!
//! ### robots.txt Compliance
//! - Fetch and cache `robots.txt` per origin (24h cache).
//! - Evaluate `*` and current User-Agent.

pub mod error;
pub mod executor;
pub mod rate_limit;
pub mod robots;
pub mod transport;
pub mod url;

pub use error::{FetchCause, FetchError};
pub use executor::{RequestExecutor, RetryPolicy};
pub use rate_limit::RateLimiter;
pub use robots::RobotsGate;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportConfig};
pub use self::url::{UrlError, absolutize, canonicalize};
