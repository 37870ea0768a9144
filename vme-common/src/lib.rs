//! # VME Common Library
//!
//! Shared code for the vault music enricher:
//! - Error type used across crates
//! - Configuration loading (TOML file, environment, compiled defaults)

pub mod config;
pub mod error;

pub use error::{Error, Result};
