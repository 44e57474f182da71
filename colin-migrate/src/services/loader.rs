//! Loader
//!
//! Applies one business's transformed records in order. Each applied filing
//! runs in its own LEAR transaction: save the document, run the filer, link
//! the filing, commit. A failure rolls back only the in-flight filing; earlier
//! filings of the same business stay committed, and the next run skips them
//! through `is_in_lear`.
//!
//! Per-business states: NOT_STARTED → (APPLYING → APPLIED)* → COMPLETED,
//! PARTIAL (stopped at an unsupported filing) or FAILED.

use colin_common::MigrationConfig;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

use super::filer::{Filer, FilerContext};
use crate::db::lear::{self, BusinessEntity, NewFiling};
use crate::db::{FlowStatusUpdate, ProcessingStatusService};
use crate::error::{EventFailure, EventRef, MigrationError, MigrationResult};
use crate::models::{CorpSummary, Disposition, EventFilingRecord, FilingKind, Transformed};

/// What one load pass did
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    /// Event ids applied in this pass, in order
    pub applied: Vec<i64>,
    /// Records passed over (already in LEAR or skipped)
    pub passed_over: usize,
    pub business: Option<BusinessEntity>,
}

pub struct Loader<'a> {
    config: &'a MigrationConfig,
    lear_pool: &'a SqlitePool,
    tracker: &'a ProcessingStatusService,
    filer: &'a dyn Filer,
}

impl<'a> Loader<'a> {
    pub fn new(
        config: &'a MigrationConfig,
        lear_pool: &'a SqlitePool,
        tracker: &'a ProcessingStatusService,
        filer: &'a dyn Filer,
    ) -> Self {
        Self {
            config,
            lear_pool,
            tracker,
            filer,
        }
    }

    /// Apply `records` for `corp` and record the outcome in the tracker
    ///
    /// Returns the failing event with the error on PARTIAL or FAILED; the
    /// tracker row is already written when this returns.
    pub async fn load_business(
        &self,
        corp: &CorpSummary,
        records: &[EventFilingRecord<Transformed>],
    ) -> Result<LoadOutcome, EventFailure> {
        match self.load_records(corp, records).await {
            Ok(outcome) => Ok(outcome),
            Err(failure) => {
                // PARTIAL is written where the unsupported filing is found
                if !failure.error.is_unsupported() {
                    self.record_failure(corp, failure.at.as_ref(), &failure.error).await;
                }
                Err(failure)
            }
        }
    }

    async fn load_records(
        &self,
        corp: &CorpSummary,
        records: &[EventFilingRecord<Transformed>],
    ) -> Result<LoadOutcome, EventFailure> {
        let flow_name = self.config.flow.flow_name();
        let at_event = |record: Option<&EventFilingRecord<Transformed>>, err: MigrationError| {
            match record {
                Some(record) => EventFailure::at(&record.header, err),
                None => EventFailure::from(err),
            }
        };

        let mut outcome = LoadOutcome {
            business: self
                .find_existing(&corp.identifier())
                .await
                .map_err(|e| at_event(records.first(), e))?,
            ..Default::default()
        };
        let mut completed = false;

        for (index, record) in records.iter().enumerate() {
            let header = &record.header;
            let is_last = index + 1 == records.len();

            match header.disposition() {
                Disposition::Unsupported => {
                    let err = MigrationError::UnsupportedFilingType {
                        event_id: header.event_id,
                        event_file_type: header.event_file_type.to_string(),
                    };
                    warn!(
                        corp_num = %corp.corp_num,
                        event_id = header.event_id,
                        event_file_type = %header.event_file_type,
                        applied = outcome.applied.len(),
                        "Unsupported filing; stopping business"
                    );
                    self.tracker
                        .update_flow_status(
                            flow_name,
                            &corp.corp_num,
                            FlowStatusUpdate::partial(
                                header.event_id,
                                header.event_file_type.to_string(),
                                err.to_string(),
                            )
                            .with_filings_count(outcome.applied.len() as i64),
                        )
                        .await
                        .map_err(|e| EventFailure::at(header, e))?;
                    return Err(EventFailure::at(header, err));
                }
                Disposition::AlreadyInLear | Disposition::Skipped(_) => {
                    debug!(
                        event_id = header.event_id,
                        disposition = ?header.disposition(),
                        "Passing over record"
                    );
                    outcome.passed_over += 1;
                }
                Disposition::Pending(kind) => {
                    match self.apply_record(kind, record, outcome.business.as_ref()).await {
                        Ok(business) => {
                            outcome.business = Some(business);
                            outcome.applied.push(header.event_id);

                            let update = if is_last {
                                completed = true;
                                FlowStatusUpdate::completed(
                                    Some(header.event_id),
                                    outcome.applied.len() as i64,
                                )
                            } else {
                                FlowStatusUpdate::progressed(header.event_id)
                            };
                            self.tracker
                                .update_flow_status(flow_name, &corp.corp_num, update)
                                .await
                                .map_err(|e| EventFailure::at(header, e))?;
                        }
                        Err(err) => {
                            if err.is_invalid_request() {
                                error!(
                                    corp_num = %corp.corp_num,
                                    event_id = header.event_id,
                                    event_file_type = %header.event_file_type,
                                    error = %err,
                                    "Invalid database request; filing rolled back"
                                );
                            } else {
                                error!(
                                    corp_num = %corp.corp_num,
                                    event_id = header.event_id,
                                    event_file_type = %header.event_file_type,
                                    error = %err,
                                    "Filing failed; rolled back"
                                );
                            }
                            return Err(EventFailure::at(header, err));
                        }
                    }
                }
            }
        }

        if !completed {
            self.tracker
                .update_flow_status(
                    flow_name,
                    &corp.corp_num,
                    FlowStatusUpdate::completed(
                        outcome.applied.last().copied(),
                        outcome.applied.len() as i64,
                    ),
                )
                .await
                .map_err(|e| at_event(records.last(), e))?;
        }

        info!(
            corp_num = %corp.corp_num,
            applied = outcome.applied.len(),
            passed_over = outcome.passed_over,
            "Business loaded"
        );
        Ok(outcome)
    }

    async fn find_existing(&self, identifier: &str) -> MigrationResult<Option<BusinessEntity>> {
        let mut conn = self.lear_pool.acquire().await?;
        lear::find_business_by_identifier(&mut conn, identifier).await
    }

    /// Apply one filing in its own transaction
    async fn apply_record(
        &self,
        kind: FilingKind,
        record: &EventFilingRecord<Transformed>,
        business: Option<&BusinessEntity>,
    ) -> MigrationResult<BusinessEntity> {
        let mut tx = self.lear_pool.begin().await?;

        match self.apply_in_tx(kind, record, business, &mut tx).await {
            Ok(entity) => {
                tx.commit().await?;
                debug!(
                    event_id = record.header.event_id,
                    kind = %kind,
                    identifier = %entity.identifier,
                    "Filing committed"
                );
                Ok(entity)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        event_id = record.header.event_id,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn apply_in_tx(
        &self,
        kind: FilingKind,
        record: &EventFilingRecord<Transformed>,
        business: Option<&BusinessEntity>,
        conn: &mut SqliteConnection,
    ) -> MigrationResult<BusinessEntity> {
        let header = &record.header;
        let filing_json = record.filing_json().ok_or_else(|| {
            MigrationError::InvalidRequest(format!(
                "event {} reached the loader without a filing document",
                header.event_id
            ))
        })?;
        let times = record.stage.times.as_ref().ok_or_else(|| {
            MigrationError::MissingData(format!("cleaned dates for event {}", header.event_id))
        })?;

        let creates = header
            .effective_kind()
            .map(|k| k.creates_business())
            .unwrap_or(false);
        if business.is_none() && !creates {
            return Err(MigrationError::BusinessNotFound(
                record.data.business.identifier.clone(),
            ));
        }

        let filing_id = lear::insert_filing(
            conn,
            &NewFiling {
                business_id: business.map(|b| b.id),
                colin_event_id: header.event_id,
                filing_type: kind.lear_name(),
                filing_json: serde_json::to_string(filing_json)?,
                effective_date: &times.effective_date,
                filing_date: &times.filing_date,
            },
        )
        .await?;

        let ctx = FilerContext {
            config: self.config,
            filing_id,
            business,
            header,
            data: &record.data,
            times,
            kind,
        };
        let entity = self.filer.apply(&ctx, conn).await?;
        lear::complete_filing(conn, filing_id, entity.id).await?;
        Ok(entity)
    }

    async fn record_failure(&self, corp: &CorpSummary, at: Option<&EventRef>, err: &MigrationError) {
        let update = FlowStatusUpdate::failed(
            at.map(|a| a.event_id),
            at.map(|a| a.event_file_type.clone()),
            err.to_string(),
        )
        .with_corp_name(corp.corp_name.clone());
        if let Err(tracker_err) = self
            .tracker
            .update_flow_status(self.config.flow.flow_name(), &corp.corp_num, update)
            .await
        {
            error!(
                corp_num = %corp.corp_num,
                error = %tracker_err,
                "Could not record failure in tracker"
            );
        }
    }
}
