// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `stanchion` Core
//!
//! Core types shared by every other `stanchion` crate.
//!
//! ## Key Types
//!
//! - [`CacheEntry`] - A cached fetch result with its category and origin
//! - [`CacheSource`] - `fetched` or `fallback`
//! - [`Category`] - Topic category derived from a key by keyword table
//! - [`ContentRecord`] - A normalized item from the content search API
//! - [`CoreError`] - Core error type

pub mod error;
pub mod models;

pub use error::CoreError;

pub use models::{CacheEntry, CacheSource, Category, ContentRecord};
