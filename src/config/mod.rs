//! Configuration module
//!
//! Loads and validates `Slimy` server configuration: listener settings,
//! combat rules, presence windows and the durable store backend.

pub mod loader;
pub mod schema;

pub use loader::{ConfigLoader, LoadResult, validate};
pub use schema::*;
