//! Cache maintenance tools.

mod invalidate;

pub use invalidate::{CacheInvalidateParams, invalidate_impl};
