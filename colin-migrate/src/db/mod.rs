//! Database access for the tracker and the LEAR registry

pub mod lear;
pub mod processing_status;
pub mod retry;

pub use lear::{colin_event_ids_in_lear, BusinessEntity};
pub use processing_status::{
    FlowStatusUpdate, ProcessedStatus, ProcessingStatusRecord, ProcessingStatusService,
};
pub use retry::retry_on_lock;
