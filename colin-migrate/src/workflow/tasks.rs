//! Per-business stage tasks
//!
//! Each task runs one stage for one business. On failure it records FAILED
//! (with the event being processed) in the tracker, logs, and returns the
//! error wrapped as a stage error so the driver drops the business from later
//! stages. The load task leaves tracker writes to the loader.

use std::sync::Arc;
use tracing::{error, info};

use super::flow::FlowContext;
use crate::db::FlowStatusUpdate;
use crate::error::{EventFailure, MigrationError, MigrationResult, Stage};
use crate::models::{Cleaned, CorpBatch, CorpSummary, Reconstructed, Transformed};
use crate::services::{
    clean_records, transform_records, EventFilingReconstructor, LoadOutcome, Loader, Reconstruction,
};

/// Claim the business and rebuild its event filing records
pub async fn reconstruct_corp(
    ctx: Arc<FlowContext>,
    corp: CorpSummary,
) -> MigrationResult<CorpBatch<Reconstructed>> {
    let flow_name = ctx.config.flow.flow_name();
    ctx.tracker
        .update_flow_status(
            flow_name,
            &corp.corp_num,
            FlowStatusUpdate::claimed(ctx.flow_run_id, corp.corp_name.clone(), corp.corp_type_cd.clone()),
        )
        .await?;

    match reconstruct(&ctx, &corp).await {
        Ok(reconstruction) => {
            ctx.tracker
                .update_flow_status(
                    flow_name,
                    &corp.corp_num,
                    FlowStatusUpdate::processing()
                        .with_filings_count(reconstruction.records.len() as i64),
                )
                .await?;
            info!(
                records = reconstruction.records.len(),
                corrections = reconstruction.corrections.len(),
                "Reconstructed"
            );
            Ok(CorpBatch {
                corp,
                records: reconstruction.records,
            })
        }
        Err(failure) => Err(fail_stage(&ctx, &corp, Stage::Reconstruct, failure).await),
    }
}

async fn reconstruct(ctx: &FlowContext, corp: &CorpSummary) -> Result<Reconstruction, EventFailure> {
    let dataset = ctx.reader.fetch_corp_dataset(&corp.corp_num).await?;
    EventFilingReconstructor::new(&ctx.reader, &ctx.lear_pool, ctx.config.flow)
        .reconstruct(&corp.corp_num, &dataset)
        .await
}

pub async fn clean_corp(
    ctx: Arc<FlowContext>,
    batch: CorpBatch<Reconstructed>,
) -> MigrationResult<CorpBatch<Cleaned>> {
    let CorpBatch { corp, records } = batch;
    match clean_records(records, &ctx.config) {
        Ok(records) => Ok(CorpBatch { corp, records }),
        Err(failure) => Err(fail_stage(&ctx, &corp, Stage::Clean, failure).await),
    }
}

pub async fn transform_corp(
    ctx: Arc<FlowContext>,
    batch: CorpBatch<Cleaned>,
) -> MigrationResult<CorpBatch<Transformed>> {
    let CorpBatch { corp, records } = batch;
    match transform_records(records) {
        Ok(records) => Ok(CorpBatch { corp, records }),
        Err(failure) => Err(fail_stage(&ctx, &corp, Stage::Transform, failure).await),
    }
}

pub async fn load_corp(
    ctx: Arc<FlowContext>,
    batch: CorpBatch<Transformed>,
) -> MigrationResult<LoadOutcome> {
    let loader = Loader::new(&ctx.config, &ctx.lear_pool, &ctx.tracker, ctx.filer.as_ref());
    loader
        .load_business(&batch.corp, &batch.records)
        .await
        .map_err(|failure| failure.into_stage_error(Stage::Load, &batch.corp.corp_num))
}

/// Record a stage failure and wrap it for the driver
async fn fail_stage(
    ctx: &FlowContext,
    corp: &CorpSummary,
    stage: Stage,
    failure: EventFailure,
) -> MigrationError {
    let (event_id, event_file_type) = match &failure.at {
        Some(at) => (Some(at.event_id), Some(at.event_file_type.clone())),
        None => (None, None),
    };

    error!(
        stage = %stage,
        event_id = ?event_id,
        event_file_type = event_file_type.as_deref().unwrap_or("-"),
        error = %failure.error,
        "Stage failed"
    );

    let update = FlowStatusUpdate::failed(event_id, event_file_type, failure.error.to_string())
        .with_corp_name(corp.corp_name.clone());
    if let Err(tracker_err) = ctx
        .tracker
        .update_flow_status(ctx.config.flow.flow_name(), &corp.corp_num, update)
        .await
    {
        error!(error = %tracker_err, "Could not record failure in tracker");
    }

    failure.into_stage_error(stage, &corp.corp_num)
}
