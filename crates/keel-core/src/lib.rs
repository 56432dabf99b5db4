//! # keel-core
//!
//! Core library for Keel providing:
//! - Configuration file parsing (keel.yaml) with environment overrides
//! - Descriptor types for bundles, artifacts and ordering metadata
//! - Package lifecycle states
//! - The shared error type

pub mod config;
pub mod error;
pub mod types;

pub use config::KeelConfig;
pub use error::{Error, Result};
