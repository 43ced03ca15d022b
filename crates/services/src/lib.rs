#![forbid(unsafe_code)]

pub mod cache;
pub mod catalog;
pub mod engine;

pub use prep_core::Clock;

pub use cache::ProgressCache;
pub use catalog::{CatalogError, ContentCatalog, StaticCatalog};
pub use engine::{PendingWrite, ProgressEngine};
