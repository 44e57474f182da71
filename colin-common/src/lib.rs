//! # COLIN Migration Common Library
//!
//! Shared code for the COLIN-to-LEAR migration flows including:
//! - Error type shared by every crate in the workspace
//! - Configuration resolution (CLI, environment, TOML file, defaults)
//! - Database pool initialization and table schemas
//! - Legacy timestamp conversion

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use config::{FlowKind, MigrationConfig};
pub use error::{Error, Result};
