//! Legacy events and corp identity

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// One legacy event with its filing columns (if it has a filing)
///
/// Rows come back from the source ordered by event timestamp; that order is
/// the processing order for every later stage.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SourceEvent {
    pub event_id: i64,
    pub event_type_cd: String,
    pub event_timestmp: NaiveDateTime,
    pub trigger_dts: Option<NaiveDateTime>,
    pub filing_type_cd: Option<String>,
    pub effective_dt: Option<NaiveDateTime>,
    pub period_end_dt: Option<NaiveDate>,
    pub court_order_num: Option<String>,
    pub arrangement_ind: Option<String>,
    pub corrected_event_id: Option<i64>,
    pub withdrawn_event_id: Option<i64>,
    pub nr_num: Option<String>,
}

impl SourceEvent {
    pub fn event_file_type(&self) -> EventFileType {
        EventFileType::new(&self.event_type_cd, self.filing_type_cd.as_deref())
    }

    pub fn is_arrangement(&self) -> bool {
        matches!(self.arrangement_ind.as_deref(), Some("Y") | Some("y"))
    }
}

/// `{event_type_cd}_{filing_type_cd}`, with `NULL` for events without a filing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EventFileType(String);

impl EventFileType {
    pub fn new(event_type_cd: &str, filing_type_cd: Option<&str>) -> Self {
        let filing = filing_type_cd
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or("NULL");
        Self(format!("{}_{}", event_type_cd.trim(), filing))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `(event_type_cd, filing_type_cd)`; the filing part is `None` for `NULL`
    pub fn parts(&self) -> (&str, Option<&str>) {
        match self.0.split_once('_') {
            Some((event, "NULL")) => (event, None),
            Some((event, filing)) => (event, Some(filing)),
            None => (self.0.as_str(), None),
        }
    }
}

impl fmt::Display for EventFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A business selected for migration
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CorpSummary {
    pub corp_num: String,
    pub corp_type_cd: String,
    pub corp_name: Option<String>,
}

impl CorpSummary {
    /// LEAR identifier for this corp
    ///
    /// Corp numbers without a letter prefix get `BC` (corporations) or `FM`
    /// (firms).
    pub fn identifier(&self) -> String {
        lear_identifier(&self.corp_num, &self.corp_type_cd)
    }
}

pub fn lear_identifier(corp_num: &str, corp_type_cd: &str) -> String {
    let corp_num = corp_num.trim();
    if corp_num.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return corp_num.to_ascii_uppercase();
    }
    match corp_type_cd {
        "SP" | "GP" => format!("FM{}", corp_num),
        _ => format!("BC{}", corp_num),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_file_type_formatting() {
        assert_eq!(EventFileType::new("FILE", Some("ICORP")).as_str(), "FILE_ICORP");
        assert_eq!(EventFileType::new("CONVICORP", None).as_str(), "CONVICORP_NULL");
        assert_eq!(EventFileType::new("SYSDA", Some("  ")).as_str(), "SYSDA_NULL");
    }

    #[test]
    fn test_event_file_type_parts() {
        assert_eq!(EventFileType::new("FILE", Some("CO_AD")).parts(), ("FILE", Some("CO_AD")));
        assert_eq!(EventFileType::new("CONVICORP", None).parts(), ("CONVICORP", None));
    }

    #[test]
    fn test_lear_identifier() {
        assert_eq!(lear_identifier("BC0000001", "BC"), "BC0000001");
        assert_eq!(lear_identifier("0123456", "ULC"), "BC0123456");
        assert_eq!(lear_identifier("0123456", "SP"), "FM0123456");
        assert_eq!(lear_identifier("c0000009", "C"), "C0000009");
    }
}
