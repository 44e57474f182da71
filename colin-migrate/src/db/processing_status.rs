//! Progress tracker
//!
//! One `corp_processing` row per (corp number, flow name, environment). This
//! table is the only state a run leaves behind for the next one: the batch
//! query reads it to decide what is still to do, and operators read it to
//! triage FAILED and PARTIAL businesses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use crate::error::{MigrationError, MigrationResult};

/// Business-level processing state
///
/// Absence of a row means not yet started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessedStatus {
    Processing,
    Completed,
    Failed,
    Partial,
}

impl ProcessedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessedStatus::Processing => "PROCESSING",
            ProcessedStatus::Completed => "COMPLETED",
            ProcessedStatus::Failed => "FAILED",
            ProcessedStatus::Partial => "PARTIAL",
        }
    }
}

impl fmt::Display for ProcessedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessedStatus {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(ProcessedStatus::Processing),
            "COMPLETED" => Ok(ProcessedStatus::Completed),
            "FAILED" => Ok(ProcessedStatus::Failed),
            "PARTIAL" => Ok(ProcessedStatus::Partial),
            other => Err(MigrationError::UnmappedValue {
                field: "processed_status",
                value: other.to_string(),
            }),
        }
    }
}

/// Fields written by one tracker update
///
/// `None` leaves the stored value unchanged. Failure fields are cleared
/// whenever the new status is PROCESSING or COMPLETED.
#[derive(Debug, Clone, Default)]
pub struct FlowStatusUpdate {
    pub processed_status: Option<ProcessedStatus>,
    pub corp_name: Option<String>,
    pub corp_type: Option<String>,
    pub filings_count: Option<i64>,
    pub last_processed_event_id: Option<i64>,
    pub failed_event_id: Option<i64>,
    pub failed_event_file_type: Option<String>,
    pub last_error: Option<String>,
    pub flow_run_id: Option<Uuid>,
}

impl FlowStatusUpdate {
    pub fn processing() -> Self {
        Self {
            processed_status: Some(ProcessedStatus::Processing),
            ..Default::default()
        }
    }

    /// Business claimed by run `flow_run_id`
    pub fn claimed(flow_run_id: Uuid, corp_name: Option<String>, corp_type: String) -> Self {
        Self {
            processed_status: Some(ProcessedStatus::Processing),
            corp_name,
            corp_type: Some(corp_type),
            flow_run_id: Some(flow_run_id),
            ..Default::default()
        }
    }

    /// One more filing applied
    pub fn progressed(last_processed_event_id: i64) -> Self {
        Self {
            processed_status: Some(ProcessedStatus::Processing),
            last_processed_event_id: Some(last_processed_event_id),
            ..Default::default()
        }
    }

    pub fn completed(last_processed_event_id: Option<i64>, filings_count: i64) -> Self {
        Self {
            processed_status: Some(ProcessedStatus::Completed),
            last_processed_event_id,
            filings_count: Some(filings_count),
            ..Default::default()
        }
    }

    pub fn failed(
        failed_event_id: Option<i64>,
        failed_event_file_type: Option<String>,
        last_error: impl Into<String>,
    ) -> Self {
        Self {
            processed_status: Some(ProcessedStatus::Failed),
            failed_event_id,
            failed_event_file_type,
            last_error: Some(last_error.into()),
            ..Default::default()
        }
    }

    /// Stopped at an unsupported filing; earlier filings stay applied
    pub fn partial(
        failed_event_id: i64,
        failed_event_file_type: String,
        last_error: impl Into<String>,
    ) -> Self {
        Self {
            processed_status: Some(ProcessedStatus::Partial),
            failed_event_id: Some(failed_event_id),
            failed_event_file_type: Some(failed_event_file_type),
            last_error: Some(last_error.into()),
            ..Default::default()
        }
    }

    pub fn with_corp_name(mut self, corp_name: Option<String>) -> Self {
        self.corp_name = corp_name;
        self
    }

    pub fn with_filings_count(mut self, filings_count: i64) -> Self {
        self.filings_count = Some(filings_count);
        self
    }
}

/// Stored tracker row
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ProcessingStatusRecord {
    pub corp_num: String,
    pub corp_name: Option<String>,
    pub corp_type_cd: Option<String>,
    pub flow_name: String,
    pub environment: String,
    pub processed_status: Option<String>,
    pub filings_count: Option<i64>,
    pub last_processed_event_id: Option<i64>,
    pub failed_event_id: Option<i64>,
    pub failed_event_file_type: Option<String>,
    pub last_error: Option<String>,
    pub flow_run_id: Option<String>,
    pub last_modified: String,
}

impl ProcessingStatusRecord {
    /// `None` when the row exists but has no status yet
    pub fn status(&self) -> MigrationResult<Option<ProcessedStatus>> {
        self.processed_status.as_deref().map(str::parse).transpose()
    }
}

/// Sole write path to the tracker table
#[derive(Clone)]
pub struct ProcessingStatusService {
    pool: SqlitePool,
    environment: String,
    max_lock_wait_ms: u64,
}

impl ProcessingStatusService {
    pub fn new(pool: SqlitePool, environment: impl Into<String>) -> Self {
        Self {
            pool,
            environment: environment.into(),
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Idempotent upsert of the (flow_name, environment, corp_num) row
    pub async fn update_flow_status(
        &self,
        flow_name: &str,
        corp_num: &str,
        update: FlowStatusUpdate,
    ) -> MigrationResult<()> {
        let status = update.processed_status.map(|s| s.as_str());
        let flow_run_id = update.flow_run_id.map(|id| id.to_string());
        let now = format_timestamp(Utc::now());

        retry_on_lock("update_flow_status", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO corp_processing (
                    corp_num, corp_name, corp_type_cd, flow_name, environment,
                    processed_status, filings_count, last_processed_event_id,
                    failed_event_id, failed_event_file_type, last_error,
                    flow_run_id, create_date, last_modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(corp_num, flow_name, environment) DO UPDATE SET
                    corp_name = COALESCE(excluded.corp_name, corp_processing.corp_name),
                    corp_type_cd = COALESCE(excluded.corp_type_cd, corp_processing.corp_type_cd),
                    processed_status = COALESCE(excluded.processed_status, corp_processing.processed_status),
                    filings_count = COALESCE(excluded.filings_count, corp_processing.filings_count),
                    last_processed_event_id = COALESCE(excluded.last_processed_event_id, corp_processing.last_processed_event_id),
                    failed_event_id = CASE
                        WHEN excluded.processed_status IN ('PROCESSING', 'COMPLETED') THEN NULL
                        ELSE COALESCE(excluded.failed_event_id, corp_processing.failed_event_id) END,
                    failed_event_file_type = CASE
                        WHEN excluded.processed_status IN ('PROCESSING', 'COMPLETED') THEN NULL
                        ELSE COALESCE(excluded.failed_event_file_type, corp_processing.failed_event_file_type) END,
                    last_error = CASE
                        WHEN excluded.processed_status IN ('PROCESSING', 'COMPLETED') THEN NULL
                        ELSE COALESCE(excluded.last_error, corp_processing.last_error) END,
                    flow_run_id = COALESCE(excluded.flow_run_id, corp_processing.flow_run_id),
                    last_modified = excluded.last_modified
                "#,
            )
            .bind(corp_num)
            .bind(&update.corp_name)
            .bind(&update.corp_type)
            .bind(flow_name)
            .bind(&self.environment)
            .bind(status)
            .bind(update.filings_count)
            .bind(update.last_processed_event_id)
            .bind(update.failed_event_id)
            .bind(&update.failed_event_file_type)
            .bind(&update.last_error)
            .bind(&flow_run_id)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
            Ok::<(), MigrationError>(())
        })
        .await?;

        tracing::debug!(
            flow_name,
            corp_num,
            status = status.unwrap_or("-"),
            "Tracker updated"
        );
        Ok(())
    }

    pub async fn get_status(
        &self,
        flow_name: &str,
        corp_num: &str,
    ) -> MigrationResult<Option<ProcessingStatusRecord>> {
        let record = sqlx::query_as::<_, ProcessingStatusRecord>(
            r#"
            SELECT corp_num, corp_name, corp_type_cd, flow_name, environment,
                   processed_status, filings_count, last_processed_event_id,
                   failed_event_id, failed_event_file_type, last_error,
                   flow_run_id, last_modified
              FROM corp_processing
             WHERE corp_num = ? AND flow_name = ? AND environment = ?
            "#,
        )
        .bind(corp_num)
        .bind(flow_name)
        .bind(&self.environment)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Rows per status for one flow in this environment
    pub async fn status_counts(&self, flow_name: &str) -> MigrationResult<Vec<(String, i64)>> {
        let rows: Vec<(Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT processed_status, COUNT(*)
              FROM corp_processing
             WHERE flow_name = ? AND environment = ?
             GROUP BY processed_status
             ORDER BY processed_status
            "#,
        )
        .bind(flow_name)
        .bind(&self.environment)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(status, count)| (status.unwrap_or_else(|| "NOT_STARTED".to_string()), count))
            .collect())
    }

    /// FAILED and PARTIAL rows for triage, most recent first
    pub async fn list_failures(
        &self,
        flow_name: &str,
        limit: i64,
    ) -> MigrationResult<Vec<ProcessingStatusRecord>> {
        let records = sqlx::query_as::<_, ProcessingStatusRecord>(
            r#"
            SELECT corp_num, corp_name, corp_type_cd, flow_name, environment,
                   processed_status, filings_count, last_processed_event_id,
                   failed_event_id, failed_event_file_type, last_error,
                   flow_run_id, last_modified
              FROM corp_processing
             WHERE flow_name = ? AND environment = ?
               AND processed_status IN ('FAILED', 'PARTIAL')
             ORDER BY last_modified DESC, corp_num
             LIMIT ?
            "#,
        )
        .bind(flow_name)
        .bind(&self.environment)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            ProcessedStatus::Processing,
            ProcessedStatus::Completed,
            ProcessedStatus::Failed,
            ProcessedStatus::Partial,
        ] {
            assert_eq!(status.as_str().parse::<ProcessedStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<ProcessedStatus>().is_err());
    }

    #[test]
    fn test_partial_update_carries_failure_context() {
        let update = FlowStatusUpdate::partial(22, "FILE_XXXXX".to_string(), "unsupported");
        assert_eq!(update.processed_status, Some(ProcessedStatus::Partial));
        assert_eq!(update.failed_event_id, Some(22));
        assert!(update.last_processed_event_id.is_none());
    }
}
