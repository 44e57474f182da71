//! Event file type classification
//!
//! Maps a legacy `(event type, filing type)` pair onto a LEAR filing kind.
//! Anything not listed is unsupported, which halts the business at load time.

use colin_common::FlowKind;

use crate::models::{Classification, EventFileType, FilingKind};

/// Look up how `event_file_type` migrates in `flow`
pub fn classify(event_file_type: &EventFileType, flow: FlowKind) -> Classification {
    use Classification::{NoOp, Supported, Unsupported};
    use FilingKind::*;

    let (event_type, filing_type) = event_file_type.parts();

    let shared = match (event_type, filing_type) {
        (_, Some("NOCAD")) => Some(Supported(ChangeOfAddress)),
        (_, Some("CO_AD" | "CO_DI" | "CO_LI" | "CO_RM" | "CO_SS" | "CORRC")) => {
            Some(Supported(Correction))
        }
        (_, Some("COGS1")) => Some(NoOp),
        _ => None,
    };
    if let Some(classification) = shared {
        return classification;
    }

    match flow {
        FlowKind::Corps => match (event_type, filing_type) {
            ("CONVICORP", None) => Supported(Conversion),
            ("FILE", Some("ICORP" | "ICORU" | "ICORC")) => Supported(IncorporationApplication),
            ("FILE", Some("AMALH" | "AMALV" | "AMALR" | "AMLHU" | "AMLVU" | "AMLRU")) => {
                Supported(AmalgamationApplication)
            }
            (_, Some("ANNBC")) => Supported(AnnualReport),
            (_, Some("NOCDR")) => Supported(ChangeOfDirectors),
            (_, Some("NOALA" | "NOALB" | "NOALU" | "NOALC" | "NOALE" | "NOALR")) => {
                Supported(Alteration)
            }
            ("FILE", Some("ADVD2" | "ADVDS")) => Supported(Dissolution),
            ("SYSDA" | "SYSDF", None) => Supported(Dissolution),
            ("FILE", Some("RESTF" | "RESTL" | "RESXL")) => Supported(Restoration),
            (_, Some("PUTBA")) => Supported(PutBackOn),
            ("FILE", Some("CONTO")) => Supported(ContinuationOut),
            _ => Unsupported,
        },
        FlowKind::Firms => match (event_type, filing_type) {
            ("FILE", Some("FRREG")) => Supported(Registration),
            ("FILE", Some("FRCHG")) => Supported(ChangeOfRegistration),
            ("FILE", Some("FRDIS")) => Supported(Dissolution),
            ("SYSDA" | "SYSDF", None) => Supported(Dissolution),
            (_, Some("PUTBA")) => Supported(PutBackOn),
            _ => Unsupported,
        },
    }
}

/// Administrative (registrar-initiated) dissolution
pub fn is_administrative_dissolution(event_file_type: &EventFileType) -> bool {
    matches!(event_file_type.parts().0, "SYSDA" | "SYSDF")
}
