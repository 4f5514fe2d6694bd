//! Domain models for stanchion.
//!
//! ## Submodules
//!
//! - [`category`] - Topic categories and the keyword classification table
//! - [`content`] - Normalized content records from the search API
//! - [`cache`] - Persisted cache entries

mod cache;
mod category;
mod content;

pub use cache::{CacheEntry, CacheSource};
pub use category::Category;
pub use content::ContentRecord;
