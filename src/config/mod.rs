//! Configuration module for tracklog
//!
//! This module provides configuration management including:
//! - Data directory resolution
//! - Settings persistence and translation into registry calls

pub mod paths;
pub mod settings;

pub use paths::TrackerPaths;
pub use settings::{CidSettings, EntityRegistration, TrackerSettings};
