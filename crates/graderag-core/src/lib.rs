//! graderag-core
//!
//! Configuration, domain types, the text cleaner and the capability traits
//! implemented by the embedding and vector crates.

pub mod cleaner;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
