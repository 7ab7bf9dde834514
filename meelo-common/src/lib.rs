//! # Meelo Common Library
//!
//! Shared code for the Meelo matcher service including:
//! - Error types
//! - TOML configuration loading and writing
//! - Catalog data transfer types (artists, albums, songs, external metadata)

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
