//! CLI command implementations.

pub mod cache;
pub mod generate;
pub mod pool;
pub mod search;
pub mod stream;
