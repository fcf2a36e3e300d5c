//! Core types and utilities for the terra geospatial workspace.
//!
//! This crate provides the error type, the sensor band configuration and
//! the logging helpers shared by the dataset, model and tool crates.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;

pub use backend::*;
pub use cli::*;
pub use config::*;
pub use error::{Error, Result};

/// Re-export commonly used burn types
pub mod prelude {
    pub use burn::prelude::*;
    pub use crate::backend::*;
    pub use crate::config::*;
    pub use crate::error::{Error, Result};
}
