//! Pipeline driver
//!
//! Runs the four stages over one batch of businesses:
//!
//! 1. Reconstruct: claim each business and rebuild its event filing records
//! 2. Clean
//! 3. Transform
//! 4. Load
//!
//! Within a stage, businesses run concurrently (bounded by
//! `max_concurrency`). Every business finishes stage N before any starts
//! stage N+1. A business that fails a stage is dropped from the rest of the
//! run; its task already recorded the failure.

use colin_common::db::{connect_pool, init_colin_database, init_lear_database};
use colin_common::MigrationConfig;
use futures::stream::{FuturesUnordered, StreamExt};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::summary::FlowSummary;
use super::tasks;
use crate::db::{FlowStatusUpdate, ProcessingStatusService};
use crate::error::{MigrationError, MigrationResult, Stage};
use crate::models::{CorpBatch, CorpSummary};
use crate::services::{Filer, RegistryFiler};
use crate::source::ColinReader;

/// Shared, read-only state for every task in one run
pub struct FlowContext {
    pub config: MigrationConfig,
    pub reader: ColinReader,
    pub lear_pool: SqlitePool,
    pub tracker: ProcessingStatusService,
    pub filer: Arc<dyn Filer>,
    pub flow_run_id: Uuid,
}

/// Anything a stage task is submitted for
pub trait CorpItem: Send + 'static {
    fn corp(&self) -> &CorpSummary;
}

impl CorpItem for CorpSummary {
    fn corp(&self) -> &CorpSummary {
        self
    }
}

impl<S: Send + 'static> CorpItem for CorpBatch<S> {
    fn corp(&self) -> &CorpSummary {
        &self.corp
    }
}

pub struct MigrationFlow {
    ctx: Arc<FlowContext>,
}

impl MigrationFlow {
    pub fn new(
        config: MigrationConfig,
        colin_pool: SqlitePool,
        lear_pool: SqlitePool,
        filer: Arc<dyn Filer>,
    ) -> Self {
        let tracker = ProcessingStatusService::new(colin_pool.clone(), config.data_load_env.clone());
        Self {
            ctx: Arc::new(FlowContext {
                config,
                reader: ColinReader::new(colin_pool),
                lear_pool,
                tracker,
                filer,
                flow_run_id: Uuid::new_v4(),
            }),
        }
    }

    /// Open both databases from `config` and prepare their tables
    pub async fn connect(config: MigrationConfig) -> MigrationResult<Self> {
        let connections = (config.max_concurrency as u32).max(1) + 1;
        let colin_pool = connect_pool(&config.colin_db_url, connections).await?;
        let lear_pool = connect_pool(&config.lear_db_url, connections).await?;
        init_colin_database(&colin_pool).await?;
        init_lear_database(&lear_pool).await?;
        Ok(Self::new(config, colin_pool, lear_pool, Arc::new(RegistryFiler::new())))
    }

    pub fn tracker(&self) -> &ProcessingStatusService {
        &self.ctx.tracker
    }

    /// Run one batch
    ///
    /// `corp_nums` restricts selection to those businesses (same eligibility
    /// rules as the batch query).
    pub async fn run(&self, corp_nums: Option<&[String]>) -> MigrationResult<FlowSummary> {
        let config = &self.ctx.config;
        let flow_name = config.flow.flow_name();
        let mut summary = FlowSummary::new(flow_name, &config.data_load_env, self.ctx.flow_run_id);

        let corps = self.ctx.reader.get_unprocessed_corps(config, corp_nums).await?;
        summary.selected = corps.len();
        info!(
            flow_name,
            environment = %config.data_load_env,
            flow_run_id = %self.ctx.flow_run_id,
            selected = corps.len(),
            batch_size = config.batch_size,
            filer = self.ctx.filer.name(),
            "Starting flow run"
        );
        if corps.is_empty() {
            summary.log();
            return Ok(summary);
        }

        let reconstructed = self
            .fan_out(Stage::Reconstruct, corps, tasks::reconstruct_corp)
            .await;
        let reconstructed = collect_successes(reconstructed, &mut summary);

        let cleaned = self.fan_out(Stage::Clean, reconstructed, tasks::clean_corp).await;
        let cleaned = collect_successes(cleaned, &mut summary);

        let transformed = self.fan_out(Stage::Transform, cleaned, tasks::transform_corp).await;
        let transformed = collect_successes(transformed, &mut summary);

        let loaded = self.fan_out(Stage::Load, transformed, tasks::load_corp).await;
        for (corp, result) in loaded {
            match result {
                Ok(outcome) => summary.record_completed(&corp.corp_num, outcome.applied.len()),
                Err(err) => summary.record_failure(&corp.corp_num, &err),
            }
        }

        summary.log();
        Ok(summary)
    }

    /// Run `task` for every item with at most `max_concurrency` in flight
    ///
    /// Returns once every item has finished. Panicked tasks are recorded as
    /// FAILED.
    async fn fan_out<I, O, F, Fut>(
        &self,
        stage: Stage,
        items: Vec<I>,
        task: F,
    ) -> Vec<(CorpSummary, MigrationResult<O>)>
    where
        I: CorpItem,
        O: Send + 'static,
        F: Fn(Arc<FlowContext>, I) -> Fut,
        Fut: Future<Output = MigrationResult<O>> + Send + 'static,
    {
        let parallelism = self.ctx.config.max_concurrency.max(1);
        let flow_name = self.ctx.config.flow.flow_name();
        let mut results = Vec::with_capacity(items.len());

        let spawn = |item: I| {
            let corp = item.corp().clone();
            let span = info_span!(
                "corp",
                corp_num = %corp.corp_num,
                flow_name,
                stage = %stage
            );
            let handle = tokio::spawn(task(Arc::clone(&self.ctx), item).instrument(span));
            async move { (corp, handle.await) }
        };

        let mut pending = items.into_iter();
        let mut in_flight = FuturesUnordered::new();
        for item in pending.by_ref().take(parallelism) {
            in_flight.push(spawn(item));
        }

        while let Some((corp, joined)) = in_flight.next().await {
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => {
                    error!(corp_num = %corp.corp_num, stage = %stage, error = %join_err, "Task aborted");
                    let err = MigrationError::Task(join_err.to_string());
                    self.record_task_failure(&corp, &err).await;
                    Err(err)
                }
            };
            results.push((corp, result));

            if let Some(item) = pending.next() {
                in_flight.push(spawn(item));
            }
        }

        results
    }

    async fn record_task_failure(&self, corp: &CorpSummary, err: &MigrationError) {
        let update = FlowStatusUpdate::failed(None, None, err.to_string())
            .with_corp_name(corp.corp_name.clone());
        if let Err(tracker_err) = self
            .ctx
            .tracker
            .update_flow_status(self.ctx.config.flow.flow_name(), &corp.corp_num, update)
            .await
        {
            error!(corp_num = %corp.corp_num, error = %tracker_err, "Could not record failure in tracker");
        }
    }
}

/// Keep successful items for the next stage; count failures
fn collect_successes<O>(
    results: Vec<(CorpSummary, MigrationResult<O>)>,
    summary: &mut FlowSummary,
) -> Vec<O> {
    results
        .into_iter()
        .filter_map(|(corp, result)| match result {
            Ok(output) => Some(output),
            Err(err) => {
                summary.record_failure(&corp.corp_num, &err);
                None
            }
        })
        .collect()
}
