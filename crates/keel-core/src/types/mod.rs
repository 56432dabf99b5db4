//! Type definitions shared across Keel crates

mod deployer_config;
mod descriptor;
mod state;

pub use deployer_config::*;
pub use descriptor::*;
pub use state::*;
