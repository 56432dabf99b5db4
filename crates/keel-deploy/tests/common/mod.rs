//! Common test utilities for keel-deploy
//!
//! This module provides shared test infrastructure including:
//! - Bundle builders for writing bundle layouts and packed bundles
//! - A scratch deployment environment
//! - Mock handlers and collaborators that record their calls
//! - Assertion helpers for registry and filesystem state

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use mocks::*;
