//! Configuration management

mod loader;

pub use loader::{apply_env_overrides, KeelConfig};
