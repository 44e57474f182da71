//! Error types for colin-migrate
//!
//! Stage functions return [`MigrationError`]. Components that walk a
//! business's events wrap errors in [`EventFailure`] so the tracker can record
//! which event was being processed when the business was abandoned.

use std::fmt;
use thiserror::Error;

use crate::models::EventFilingHeader;

/// Pipeline stage a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reconstruct,
    Clean,
    Transform,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Reconstruct => "reconstruct",
            Stage::Clean => "clean",
            Stage::Transform => "transform",
            Stage::Load => "load",
        };
        f.write_str(name)
    }
}

/// Migration error type
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Filing type with no LEAR counterpart; halts the rest of the business
    #[error("Unsupported filing type {event_file_type} (event {event_id})")]
    UnsupportedFilingType { event_id: i64, event_file_type: String },

    /// Correction names an event that was not seen earlier in the walk
    #[error("Event {event_id} corrects unknown event {corrected_event_id}")]
    UnknownCorrectionTarget { event_id: i64, corrected_event_id: i64 },

    /// Target database is in a state the request cannot be applied to
    #[error("Invalid database request: {0}")]
    InvalidRequest(String),

    /// Filing mutates a business that does not exist in LEAR
    #[error("Business {0} not found in LEAR")]
    BusinessNotFound(String),

    /// Required source data is absent
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Legacy code with no LEAR mapping
    #[error("No mapping for {field} '{value}'")]
    UnmappedValue { field: &'static str, value: String },

    /// A stage failed for one business
    #[error("{stage} failed for {corp_num}: {source}")]
    Stage {
        stage: Stage,
        corp_num: String,
        event_id: Option<i64>,
        event_file_type: Option<String>,
        #[source]
        source: Box<MigrationError>,
    },

    /// Per-business task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Common error: {0}")]
    Common(#[from] colin_common::Error),
}

impl MigrationError {
    /// The error at the bottom of any stage wrapping
    pub fn root(&self) -> &MigrationError {
        match self {
            MigrationError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Unsupported filing: business ends PARTIAL rather than FAILED
    pub fn is_unsupported(&self) -> bool {
        matches!(self.root(), MigrationError::UnsupportedFilingType { .. })
    }

    /// Target-database state conflicts
    ///
    /// Explicit invalid requests and unique-constraint violations (a filing
    /// for the same COLIN event already recorded) fall in this class.
    pub fn is_invalid_request(&self) -> bool {
        match self.root() {
            MigrationError::InvalidRequest(_) => true,
            MigrationError::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

/// Event being processed when a failure happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRef {
    pub event_id: i64,
    pub event_file_type: String,
}

impl From<&EventFilingHeader> for EventRef {
    fn from(header: &EventFilingHeader) -> Self {
        Self {
            event_id: header.event_id,
            event_file_type: header.event_file_type.to_string(),
        }
    }
}

/// Error with the event context it happened at, if any
#[derive(Debug, Error)]
#[error("{error}")]
pub struct EventFailure {
    pub at: Option<EventRef>,
    #[source]
    pub error: MigrationError,
}

impl EventFailure {
    pub fn at(event: impl Into<EventRef>, error: impl Into<MigrationError>) -> Self {
        Self {
            at: Some(event.into()),
            error: error.into(),
        }
    }

    /// Wrap as a stage error for `corp_num`
    pub fn into_stage_error(self, stage: Stage, corp_num: &str) -> MigrationError {
        MigrationError::Stage {
            stage,
            corp_num: corp_num.to_string(),
            event_id: self.at.as_ref().map(|a| a.event_id),
            event_file_type: self.at.map(|a| a.event_file_type),
            source: Box::new(self.error),
        }
    }
}

impl From<MigrationError> for EventFailure {
    fn from(error: MigrationError) -> Self {
        Self { at: None, error }
    }
}

impl From<sqlx::Error> for EventFailure {
    fn from(error: sqlx::Error) -> Self {
        MigrationError::from(error).into()
    }
}

impl From<colin_common::Error> for EventFailure {
    fn from(error: colin_common::Error) -> Self {
        MigrationError::from(error).into()
    }
}

/// Result type for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;
