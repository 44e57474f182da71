//! colin-migrate library interface
//!
//! COLIN-to-LEAR migration: reads a business's legacy event stream, rebuilds
//! one filing record per event, cleans and shapes each into a LEAR filing
//! document, and applies them in order while tracking progress per business.

pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod source;
pub mod workflow;

pub use crate::error::{MigrationError, MigrationResult, Stage};
pub use crate::workflow::{FlowSummary, MigrationFlow};
