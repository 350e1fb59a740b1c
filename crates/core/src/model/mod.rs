//! Listing data model shared by connectors, the normalizer, the cache and
//! the aggregation service.

pub mod criteria;
pub mod listing;
pub mod portal;
pub mod raw;

pub use criteria::{CriteriaKey, SearchCriteria};
pub use listing::{Features, Listing, Price};
pub use portal::{Portal, PropertyType, PropertyTypeFilter};
pub use raw::RawListing;
