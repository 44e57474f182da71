//! Run summary

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::MigrationError;

/// Outcome of one flow run
#[derive(Debug, Clone, Serialize)]
pub struct FlowSummary {
    pub flow_name: String,
    pub environment: String,
    pub flow_run_id: Uuid,
    pub selected: usize,
    pub completed: Vec<String>,
    pub partial: Vec<String>,
    pub failed: Vec<String>,
    pub filings_applied: usize,
}

impl FlowSummary {
    pub fn new(flow_name: &str, environment: &str, flow_run_id: Uuid) -> Self {
        Self {
            flow_name: flow_name.to_string(),
            environment: environment.to_string(),
            flow_run_id,
            selected: 0,
            completed: Vec::new(),
            partial: Vec::new(),
            failed: Vec::new(),
            filings_applied: 0,
        }
    }

    pub fn record_completed(&mut self, corp_num: &str, filings_applied: usize) {
        self.completed.push(corp_num.to_string());
        self.filings_applied += filings_applied;
    }

    /// Unsupported filings count as PARTIAL, everything else as FAILED
    pub fn record_failure(&mut self, corp_num: &str, err: &MigrationError) {
        if err.is_unsupported() {
            self.partial.push(corp_num.to_string());
        } else {
            self.failed.push(corp_num.to_string());
        }
    }

    pub fn log(&self) {
        info!(
            flow_name = %self.flow_name,
            environment = %self.environment,
            flow_run_id = %self.flow_run_id,
            selected = self.selected,
            completed = self.completed.len(),
            partial = self.partial.len(),
            failed = self.failed.len(),
            filings_applied = self.filings_applied,
            "Flow run finished"
        );
    }
}
