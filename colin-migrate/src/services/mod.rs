//! Pipeline stage services

pub mod classification;
pub mod data_cleaner;
pub mod event_filing;
pub mod filer;
pub mod filing_json;
pub mod loader;

pub use classification::classify;
pub use data_cleaner::clean_records;
pub use event_filing::{EventFilingReconstructor, Reconstruction};
pub use filer::{Filer, FilerContext, RegistryFiler};
pub use filing_json::{build_filing_json, transform_records};
pub use loader::{LoadOutcome, Loader};
