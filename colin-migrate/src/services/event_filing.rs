//! Event filing reconstruction
//!
//! Walks one business's events once, oldest first, producing one
//! [`EventFilingRecord`] per event. Corrections can only point backwards, so a
//! side table of already-emitted records is enough to resolve them; the
//! corrected record is marked superseded and the correction inherits its
//! LEAR filing kind.

use colin_common::FlowKind;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use super::classification::classify;
use crate::db::colin_event_ids_in_lear;
use crate::error::{EventFailure, EventRef, MigrationError};
use crate::models::{
    Classification, CorrectionMapping, EventFilingHeader, EventFilingRecord, FilingData,
    FilingKind, Reconstructed, SkipReason, SourceEvent,
};
use crate::source::{ColinReader, CorpDataset};

/// Records for one business plus the corrections found while building them
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub records: Vec<EventFilingRecord<Reconstructed>>,
    /// Keyed by the corrected event's id
    pub corrections: BTreeMap<i64, CorrectionMapping>,
}

impl Reconstruction {
    pub fn event_ids(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.header.event_id).collect()
    }
}

pub struct EventFilingReconstructor<'a> {
    reader: &'a ColinReader,
    lear_pool: &'a SqlitePool,
    flow: FlowKind,
}

impl<'a> EventFilingReconstructor<'a> {
    pub fn new(reader: &'a ColinReader, lear_pool: &'a SqlitePool, flow: FlowKind) -> Self {
        Self {
            reader,
            lear_pool,
            flow,
        }
    }

    /// Build the ordered record list for `corp_num` from its dataset
    ///
    /// Any error abandons the whole business; the failure carries the event
    /// being processed when it happened.
    pub async fn reconstruct(
        &self,
        corp_num: &str,
        dataset: &CorpDataset,
    ) -> Result<Reconstruction, EventFailure> {
        let events = &dataset.filings;
        if events.is_empty() {
            debug!(corp_num, "No events; nothing to reconstruct");
            return Ok(Reconstruction::default());
        }
        if dataset.business.is_none() {
            return Err(MigrationError::MissingData(format!(
                "corporation row for {} ({} events)",
                corp_num,
                events.len()
            ))
            .into());
        }

        let event_ids = dataset.event_ids();
        let in_lear = colin_event_ids_in_lear(self.lear_pool, &event_ids).await?;

        let mut walk = Walk::default();
        let mut previous: Option<FilingData> = None;

        for (pos, event) in events.iter().enumerate() {
            let event_file_type = event.event_file_type();
            let classification = classify(&event_file_type, self.flow);
            let mut header = EventFilingHeader::new(
                corp_num,
                event.event_id,
                event_file_type,
                classification,
                in_lear.contains(&event.event_id),
            );

            let data = self
                .reader
                .fetch_filing_data(corp_num, event, &event_ids[..pos], previous.as_ref())
                .await
                .map_err(|e| EventFailure::at(&header, e))?;

            if event.withdrawn_event_id.is_some() && classification.kind().is_some() {
                header.skip_reason = Some(SkipReason::Withdrawn);
            }

            if classification.kind() == Some(FilingKind::Correction) {
                walk.link_correction(&mut header, event)
                    .map_err(|e| EventFailure::at(&header, e))?;
            }

            previous = Some(data.clone());
            walk.push(EventFilingRecord::new(header, data));
        }

        debug!(
            corp_num,
            records = walk.records.len(),
            corrections = walk.corrections.len(),
            in_lear = in_lear.len(),
            "Reconstructed event filings"
        );

        Ok(Reconstruction {
            records: walk.records,
            corrections: walk.corrections,
        })
    }
}

/// State carried across one forward pass
#[derive(Default)]
struct Walk {
    records: Vec<EventFilingRecord<Reconstructed>>,
    index_by_event: HashMap<i64, usize>,
    corrections: BTreeMap<i64, CorrectionMapping>,
}

impl Walk {
    fn push(&mut self, record: EventFilingRecord<Reconstructed>) {
        self.index_by_event
            .insert(record.header.event_id, self.records.len());
        self.records.push(record);
    }

    /// Resolve `event`'s target, supersede it, and attach the mapping to `header`
    fn link_correction(
        &mut self,
        header: &mut EventFilingHeader,
        event: &SourceEvent,
    ) -> Result<(), MigrationError> {
        let corrected_event_id = event.corrected_event_id.ok_or_else(|| {
            MigrationError::MissingData(format!(
                "correction event {} has no corrected event id",
                event.event_id
            ))
        })?;

        let index = *self.index_by_event.get(&corrected_event_id).ok_or(
            MigrationError::UnknownCorrectionTarget {
                event_id: event.event_id,
                corrected_event_id,
            },
        )?;
        let target = &mut self.records[index].header;

        let target_kind = match (target.classification, target.correction) {
            (Classification::Supported(FilingKind::Correction), Some(mapping)) => {
                Some(mapping.target_filing_type)
            }
            (Classification::Supported(FilingKind::Correction), None) => None,
            (Classification::Supported(kind), _) => Some(kind),
            (Classification::NoOp | Classification::Unsupported, _) => None,
        };

        let Some(target_filing_type) = target_kind else {
            warn!(
                corp_num = %header.corp_num,
                event_id = event.event_id,
                corrected_event_id,
                target = %target.event_file_type,
                "Correction of a filing with no LEAR counterpart"
            );
            header.classification = Classification::Unsupported;
            return Ok(());
        };

        target.supersede(event.event_id);

        let mapping = CorrectionMapping {
            corrected_event_id,
            target_filing_type,
        };
        self.corrections.insert(corrected_event_id, mapping);
        header.correction = Some(mapping);

        debug!(
            event_id = event.event_id,
            corrected = %EventRef::from(&*target).event_file_type,
            corrected_event_id,
            "Linked correction"
        );
        Ok(())
    }
}
