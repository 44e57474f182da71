//! Per-event working records
//!
//! One [`EventFilingRecord`] exists per (corp number, event id). The stage
//! parameter records how far through the pipeline the record has come:
//!
//! Reconstructed → Cleaned → Transformed
//!
//! Each stage consumes the previous stage's records and produces new ones, so
//! the loader can only ever see transformed records.

use serde::Serialize;

use super::event::{CorpSummary, EventFileType};
use super::filing_data::FilingData;
use super::filing_kind::{Classification, FilingKind};

/// Links a correction event to the event it corrects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionMapping {
    pub corrected_event_id: i64,
    #[serde(rename = "learFilingType")]
    pub target_filing_type: FilingKind,
}

/// Why a supported filing will not be migrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// A later correction replaces this filing
    Superseded { by_event_id: i64 },
    /// Filing has no effect on LEAR state
    NoOp,
    /// Filing was withdrawn in the legacy system
    Withdrawn,
}

/// What the transformer and loader do with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Halts the rest of the business
    Unsupported,
    /// Filing already exists in LEAR
    AlreadyInLear,
    Skipped(SkipReason),
    /// Needs transforming and applying as this kind
    Pending(FilingKind),
}

/// Classification and identity shared by every stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFilingHeader {
    pub corp_num: String,
    pub event_id: i64,
    pub event_file_type: EventFileType,
    #[serde(skip)]
    pub classification: Classification,
    pub is_in_lear: bool,
    pub skip_reason: Option<SkipReason>,
    pub correction: Option<CorrectionMapping>,
}

impl EventFilingHeader {
    pub fn new(
        corp_num: &str,
        event_id: i64,
        event_file_type: EventFileType,
        classification: Classification,
        is_in_lear: bool,
    ) -> Self {
        let skip_reason = match classification {
            Classification::NoOp => Some(SkipReason::NoOp),
            _ => None,
        };
        Self {
            corp_num: corp_num.to_string(),
            event_id,
            event_file_type,
            classification,
            is_in_lear,
            skip_reason,
            correction: None,
        }
    }

    pub fn is_supported_type(&self) -> bool {
        self.classification.is_supported()
    }

    pub fn skip_filing(&self) -> bool {
        self.skip_reason.is_some()
    }

    /// Mark this record as replaced by a later correction
    ///
    /// The only mutation ever made to an already-emitted record.
    pub fn supersede(&mut self, by_event_id: i64) {
        self.skip_reason = Some(SkipReason::Superseded { by_event_id });
    }

    /// Unsupported first, then already-in-LEAR, then skipped
    ///
    /// `is_in_lear` and `skip_filing` are independent gates; a record only
    /// becomes pending when neither is set.
    pub fn disposition(&self) -> Disposition {
        match self.classification {
            Classification::Unsupported => Disposition::Unsupported,
            _ if self.is_in_lear => Disposition::AlreadyInLear,
            _ => match (self.skip_reason, self.classification) {
                (Some(reason), _) => Disposition::Skipped(reason),
                (None, Classification::Supported(kind)) => Disposition::Pending(kind),
                (None, _) => Disposition::Skipped(SkipReason::NoOp),
            },
        }
    }

    /// Kind whose state effects this filing has
    ///
    /// A correction behaves like the filing it corrects.
    pub fn effective_kind(&self) -> Option<FilingKind> {
        match (self.classification.kind(), self.correction) {
            (Some(FilingKind::Correction), Some(mapping)) => Some(mapping.target_filing_type),
            (kind, _) => kind,
        }
    }
}

/// Event dates resolved by the cleaner, in LEAR form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventTimes {
    /// UTC RFC 3339
    pub event_timestamp: String,
    /// UTC RFC 3339; filing effective date, else trigger date, else event time
    pub effective_date: String,
    /// `YYYY-MM-DD` in legacy local time
    pub filing_date: String,
    pub founding_date: Option<String>,
}

/// Stage marker: built by the reconstructor
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstructed;

/// Stage marker: normalized by the cleaner
///
/// `times` is set for every supported, non-skipped record.
#[derive(Debug, Clone, PartialEq)]
pub struct Cleaned {
    pub times: Option<EventTimes>,
}

/// Stage marker: shaped by the transformer
///
/// `filing_json` is set exactly for pending records.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub times: Option<EventTimes>,
    pub filing_json: Option<serde_json::Value>,
}

/// One event's working record at stage `S`
#[derive(Debug, Clone, PartialEq)]
pub struct EventFilingRecord<S> {
    pub header: EventFilingHeader,
    pub data: FilingData,
    pub stage: S,
}

impl EventFilingRecord<Reconstructed> {
    pub fn new(header: EventFilingHeader, data: FilingData) -> Self {
        Self {
            header,
            data,
            stage: Reconstructed,
        }
    }
}

impl<S> EventFilingRecord<S> {
    /// Move to the next stage keeping header and data
    pub fn advance<T>(self, stage: T) -> EventFilingRecord<T> {
        EventFilingRecord {
            header: self.header,
            data: self.data,
            stage,
        }
    }
}

impl EventFilingRecord<Transformed> {
    pub fn filing_json(&self) -> Option<&serde_json::Value> {
        self.stage.filing_json.as_ref()
    }
}

/// One business and its ordered records at stage `S`
#[derive(Debug, Clone)]
pub struct CorpBatch<S> {
    pub corp: CorpSummary,
    pub records: Vec<EventFilingRecord<S>>,
}
