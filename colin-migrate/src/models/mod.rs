//! Data types flowing through the migration pipeline

pub mod event;
pub mod filing_data;
pub mod filing_kind;
pub mod record;

pub use event::{CorpSummary, EventFileType, SourceEvent};
pub use filing_data::{
    Address, Alias, AmalgamatingBusiness, BusinessSnapshot, FilingData, Office, Party,
    Resolution, ShareClass,
};
pub use filing_kind::{Classification, FilingKind};
pub use record::{
    Cleaned, CorpBatch, CorrectionMapping, Disposition, EventFilingHeader, EventFilingRecord,
    EventTimes, Reconstructed, SkipReason, Transformed,
};
