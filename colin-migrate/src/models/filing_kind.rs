//! LEAR filing kinds the pipeline knows how to migrate

use serde::{Serialize, Serializer};
use std::fmt;

/// Closed set of supported LEAR filing kinds
///
/// Each kind has its own JSON section builder and its own set of state
/// effects; adding a kind is a compile error until both are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilingKind {
    IncorporationApplication,
    Conversion,
    Registration,
    AmalgamationApplication,
    AnnualReport,
    ChangeOfAddress,
    ChangeOfDirectors,
    Alteration,
    ChangeOfRegistration,
    Correction,
    Dissolution,
    Restoration,
    PutBackOn,
    ContinuationOut,
}

impl FilingKind {
    /// LEAR filing type name
    pub fn lear_name(&self) -> &'static str {
        match self {
            FilingKind::IncorporationApplication => "incorporationApplication",
            FilingKind::Conversion => "conversion",
            FilingKind::Registration => "registration",
            FilingKind::AmalgamationApplication => "amalgamationApplication",
            FilingKind::AnnualReport => "annualReport",
            FilingKind::ChangeOfAddress => "changeOfAddress",
            FilingKind::ChangeOfDirectors => "changeOfDirectors",
            FilingKind::Alteration => "alteration",
            FilingKind::ChangeOfRegistration => "changeOfRegistration",
            FilingKind::Correction => "correction",
            FilingKind::Dissolution => "dissolution",
            FilingKind::Restoration => "restoration",
            FilingKind::PutBackOn => "putBackOn",
            FilingKind::ContinuationOut => "continuationOut",
        }
    }

    /// Filing brings the business into existence in LEAR
    pub fn creates_business(&self) -> bool {
        matches!(
            self,
            FilingKind::IncorporationApplication
                | FilingKind::Conversion
                | FilingKind::Registration
                | FilingKind::AmalgamationApplication
        )
    }
}

impl fmt::Display for FilingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lear_name())
    }
}

impl Serialize for FilingKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.lear_name())
    }
}

/// Outcome of looking an event file type up in the classification table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Migrated as this LEAR filing kind
    Supported(FilingKind),
    /// Known filing with no effect on LEAR state; always skipped
    NoOp,
    /// No LEAR counterpart
    Unsupported,
}

impl Classification {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Classification::Unsupported)
    }

    pub fn kind(&self) -> Option<FilingKind> {
        match self {
            Classification::Supported(kind) => Some(*kind),
            _ => None,
        }
    }
}
