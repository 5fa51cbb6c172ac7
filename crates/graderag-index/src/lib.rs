//! Per-category index lifecycle: build once, publish atomically, reload, query.

pub mod builder;
pub mod catalog;
pub mod retrieval;
pub mod store;

pub use builder::{BuildOutcome, BuildReport, IndexBuilder};
pub use catalog::{CatalogEntry, CatalogParams, IndexCatalog, CATALOG_FILE};
pub use retrieval::RetrievalService;
pub use store::{CategoryIndexStore, LoadedIndex, Publication};
