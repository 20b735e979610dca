//! # memebox common library
//!
//! Shared code for the memebox service crates:
//! - Catalog data model (`MemeRecord`, `Catalog`) and its on-disk format
//! - Common error types
//! - Configuration loading and resolution

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{Catalog, MemeRecord};
pub use error::{Error, Result};
