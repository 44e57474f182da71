//! Stage-by-stage tests: reconstruct, clean, transform, load
//!
//! Drives the stage functions directly so intermediate records can be
//! inspected between stages.

mod helpers;

use async_trait::async_trait;
use colin_common::FlowKind;
use colin_migrate::db::lear::BusinessEntity;
use colin_migrate::db::{FlowStatusUpdate, ProcessedStatus, ProcessingStatusService};
use colin_migrate::models::{
    CorpSummary, Disposition, EventFilingRecord, FilingKind, SkipReason, Transformed,
};
use colin_migrate::services::{
    clean_records, transform_records, EventFilingReconstructor, Filer, FilerContext, Loader,
    RegistryFiler,
};
use colin_migrate::source::ColinReader;
use colin_migrate::{MigrationError, MigrationResult};
use helpers::*;
use sqlx::SqliteConnection;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts calls and delegates to the registry filer
#[derive(Default)]
struct CountingFiler {
    inner: RegistryFiler,
    calls: AtomicUsize,
}

#[async_trait]
impl Filer for CountingFiler {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn apply(
        &self,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
    ) -> MigrationResult<BusinessEntity> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.apply(ctx, conn).await
    }
}

fn summary(corp_num: &str, name: &str) -> CorpSummary {
    CorpSummary {
        corp_num: corp_num.to_string(),
        corp_type_cd: "BC".to_string(),
        corp_name: Some(name.to_string()),
    }
}

async fn transformed_records(dbs: &TestDbs, corp_num: &str) -> Vec<EventFilingRecord<Transformed>> {
    let config = test_config(FlowKind::Corps);
    let reader = ColinReader::new(dbs.colin.clone());
    let dataset = reader.fetch_corp_dataset(corp_num).await.unwrap();
    let reconstruction = EventFilingReconstructor::new(&reader, &dbs.lear, FlowKind::Corps)
        .reconstruct(corp_num, &dataset)
        .await
        .unwrap();
    let cleaned = clean_records(reconstruction.records, &config).unwrap();
    transform_records(cleaned).unwrap()
}

#[tokio::test]
async fn test_correction_supersedes_its_target() {
    let dbs = setup_databases().await;
    seed_bc0000001(&dbs.colin).await;
    let reader = ColinReader::new(dbs.colin.clone());
    let dataset = reader.fetch_corp_dataset("BC0000001").await.unwrap();

    let reconstruction = EventFilingReconstructor::new(&reader, &dbs.lear, FlowKind::Corps)
        .reconstruct("BC0000001", &dataset)
        .await
        .unwrap();

    assert_eq!(reconstruction.event_ids(), vec![101, 102, 103]);
    let headers: Vec<_> = reconstruction.records.iter().map(|r| &r.header).collect();
    assert_eq!(
        headers[0].disposition(),
        Disposition::Pending(FilingKind::IncorporationApplication)
    );
    assert_eq!(
        headers[1].disposition(),
        Disposition::Skipped(SkipReason::Superseded { by_event_id: 103 })
    );
    assert_eq!(headers[2].disposition(), Disposition::Pending(FilingKind::Correction));

    let mapping = headers[2].correction.expect("correction mapping");
    assert_eq!(mapping.corrected_event_id, 102);
    assert_eq!(mapping.target_filing_type, FilingKind::ChangeOfAddress);
    assert_eq!(reconstruction.corrections.get(&102), Some(&mapping));
}

#[tokio::test]
async fn test_events_already_in_lear_are_flagged() {
    let dbs = setup_databases().await;
    seed_bc0000003(&dbs.colin).await;
    sqlx::query(
        "INSERT INTO filings (colin_event_id, filing_type, filing_json, status) VALUES (301, 'incorporationApplication', '{}', 'COMPLETED')",
    )
    .execute(&dbs.lear)
    .await
    .unwrap();

    let records = transformed_records(&dbs, "BC0000003").await;

    assert!(records[0].header.is_in_lear);
    assert_eq!(records[0].header.disposition(), Disposition::AlreadyInLear);
    assert!(records[0].filing_json().is_none());
    assert!(!records[1].header.is_in_lear);
    assert!(records[1].filing_json().is_some());
}

#[tokio::test]
async fn test_transform_builds_documents_for_pending_records_only() {
    let dbs = setup_databases().await;
    seed_bc0000001(&dbs.colin).await;

    let records = transformed_records(&dbs, "BC0000001").await;

    let incorporation = records[0].filing_json().expect("incorporation document");
    assert_eq!(incorporation["filing"]["header"]["name"], "incorporationApplication");
    assert_eq!(incorporation["filing"]["header"]["source"], "COLIN");
    assert_eq!(incorporation["filing"]["header"]["colinIds"][0], 101);
    assert_eq!(
        incorporation["filing"]["header"]["effectiveDate"],
        "2020-01-15T18:00:00+00:00"
    );
    assert_eq!(incorporation["filing"]["business"]["identifier"], "BC0000001");
    assert_eq!(
        incorporation["filing"]["incorporationApplication"]["offices"]["registeredOffice"]
            ["deliveryAddress"]["streetAddress"],
        "100 Founding St"
    );

    assert!(records[1].filing_json().is_none());
    assert!(records[1].stage.times.is_none());

    let correction = records[2].filing_json().expect("correction document");
    let section = &correction["filing"]["correction"];
    assert_eq!(section["correctedEventId"], 102);
    assert_eq!(section["correctedFilingType"], "changeOfAddress");
    assert_eq!(
        section["offices"]["registeredOffice"]["mailingAddress"]["streetAddress"],
        "300 Right Rd"
    );
}

#[tokio::test]
async fn test_corp_name_suffix_applied_in_cleaning() {
    let dbs = setup_databases().await;
    seed_bc0000003(&dbs.colin).await;
    let mut config = test_config(FlowKind::Corps);
    config.corp_name_suffix = Some("(TEST)".to_string());

    let reader = ColinReader::new(dbs.colin.clone());
    let dataset = reader.fetch_corp_dataset("BC0000003").await.unwrap();
    let reconstruction = EventFilingReconstructor::new(&reader, &dbs.lear, FlowKind::Corps)
        .reconstruct("BC0000003", &dataset)
        .await
        .unwrap();
    let cleaned = clean_records(reconstruction.records, &config).unwrap();

    assert_eq!(
        cleaned[0].data.business.legal_name.as_deref(),
        Some("GAMMA VENTURES LTD. (TEST)")
    );
}

#[tokio::test]
async fn test_loader_applies_in_order_and_completes() {
    let dbs = setup_databases().await;
    seed_bc0000001(&dbs.colin).await;
    let records = transformed_records(&dbs, "BC0000001").await;

    let config = test_config(FlowKind::Corps);
    let tracker = ProcessingStatusService::new(dbs.colin.clone(), TEST_ENV);
    let filer = CountingFiler::default();
    let loader = Loader::new(&config, &dbs.lear, &tracker, &filer);

    let outcome = loader
        .load_business(&summary("BC0000001", "ACME WIDGETS LTD."), &records)
        .await
        .unwrap();

    assert_eq!(outcome.applied, vec![101, 103]);
    assert_eq!(outcome.passed_over, 1);
    assert_eq!(filer.calls.load(Ordering::SeqCst), 2);

    let business = outcome.business.expect("business created");
    assert_eq!(business.identifier, "BC0000001");
    assert_eq!(business.legal_type, "BC");
    assert_eq!(business.founding_date.as_deref(), Some("2020-01-15T18:00:00+00:00"));

    let filings = colin_migrate::db::lear::filings_for_business(&dbs.lear, business.id)
        .await
        .unwrap();
    assert_eq!(
        filings,
        vec![
            (101, "incorporationApplication".to_string()),
            (103, "correction".to_string()),
        ]
    );
    assert_eq!(
        active_registered_street(&dbs.lear, business.id).await.as_deref(),
        Some("300 Right Rd")
    );

    let row = tracker
        .get_status("corps-flow", "BC0000001")
        .await
        .unwrap()
        .expect("tracker row");
    assert_eq!(row.status().unwrap(), Some(ProcessedStatus::Completed));
    assert_eq!(row.last_processed_event_id, Some(103));
    assert_eq!(row.filings_count, Some(2));
}

#[tokio::test]
async fn test_loader_does_not_refile_records_in_lear() {
    let dbs = setup_databases().await;
    seed_bc0000003(&dbs.colin).await;
    let config = test_config(FlowKind::Corps);
    let tracker = ProcessingStatusService::new(dbs.colin.clone(), TEST_ENV);
    let corp = summary("BC0000003", "GAMMA VENTURES LTD.");

    let first = CountingFiler::default();
    let records = transformed_records(&dbs, "BC0000003").await;
    Loader::new(&config, &dbs.lear, &tracker, &first)
        .load_business(&corp, &records)
        .await
        .unwrap();
    assert_eq!(first.calls.load(Ordering::SeqCst), 2);

    // Second pass sees both events in LEAR
    let second = CountingFiler::default();
    let records = transformed_records(&dbs, "BC0000003").await;
    let outcome = Loader::new(&config, &dbs.lear, &tracker, &second)
        .load_business(&corp, &records)
        .await
        .unwrap();

    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.passed_over, 2);
    assert!(outcome.business.is_some());
}

#[tokio::test]
async fn test_loader_stops_at_unsupported_filing() {
    let dbs = setup_databases().await;
    seed_bc0000002(&dbs.colin).await;
    let records = transformed_records(&dbs, "BC0000002").await;

    let config = test_config(FlowKind::Corps);
    let tracker = ProcessingStatusService::new(dbs.colin.clone(), TEST_ENV);
    let filer = CountingFiler::default();

    let failure = Loader::new(&config, &dbs.lear, &tracker, &filer)
        .load_business(&summary("BC0000002", "BETA HOLDINGS INC."), &records)
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        MigrationError::UnsupportedFilingType { event_id: 202, .. }
    ));
    assert_eq!(failure.at.as_ref().map(|a| a.event_id), Some(202));
    assert_eq!(filer.calls.load(Ordering::SeqCst), 1);

    let row = tracker
        .get_status("corps-flow", "BC0000002")
        .await
        .unwrap()
        .expect("tracker row");
    assert_eq!(row.status().unwrap(), Some(ProcessedStatus::Partial));
    assert_eq!(row.last_processed_event_id, Some(201));
    assert_eq!(row.failed_event_id, Some(202));
    assert_eq!(row.failed_event_file_type.as_deref(), Some("FILE_XXXXX"));

    // The incorporation stays applied
    let business_id = lear_business_id(&dbs.lear, "BC0000002").await.expect("business");
    let filings = colin_migrate::db::lear::filings_for_business(&dbs.lear, business_id)
        .await
        .unwrap();
    assert_eq!(filings.len(), 1);
}

#[tokio::test]
async fn test_loader_requires_business_for_non_creating_filing() {
    let dbs = setup_databases().await;
    seed_bc0000003(&dbs.colin).await;
    let mut records = transformed_records(&dbs, "BC0000003").await;
    // Drop the incorporation so the address change has nothing to apply to
    records.remove(0);

    let config = test_config(FlowKind::Corps);
    let tracker = ProcessingStatusService::new(dbs.colin.clone(), TEST_ENV);
    let filer = CountingFiler::default();

    let failure = Loader::new(&config, &dbs.lear, &tracker, &filer)
        .load_business(&summary("BC0000003", "GAMMA VENTURES LTD."), &records)
        .await
        .unwrap_err();

    assert!(matches!(failure.error, MigrationError::BusinessNotFound(_)));
    assert_eq!(filer.calls.load(Ordering::SeqCst), 0);

    let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM filings")
        .fetch_one(&dbs.lear)
        .await
        .unwrap();
    assert_eq!(leftover, 0);

    let row = tracker
        .get_status("corps-flow", "BC0000003")
        .await
        .unwrap()
        .expect("tracker row");
    assert_eq!(row.status().unwrap(), Some(ProcessedStatus::Failed));
    assert_eq!(row.failed_event_id, Some(302));
}

#[tokio::test]
async fn test_loader_records_failure_when_target_lookup_fails() {
    let dbs = setup_databases().await;
    seed_bc0000001(&dbs.colin).await;
    let records = transformed_records(&dbs, "BC0000001").await;

    let config = test_config(FlowKind::Corps);
    let tracker = ProcessingStatusService::new(dbs.colin.clone(), TEST_ENV);
    tracker
        .update_flow_status("corps-flow", "BC0000001", FlowStatusUpdate::processing())
        .await
        .unwrap();
    sqlx::query("DROP TABLE businesses")
        .execute(&dbs.lear)
        .await
        .unwrap();
    let filer = CountingFiler::default();

    let failure = Loader::new(&config, &dbs.lear, &tracker, &filer)
        .load_business(&summary("BC0000001", "ACME WIDGETS LTD."), &records)
        .await
        .unwrap_err();

    assert!(matches!(failure.error, MigrationError::Database(_)));
    assert_eq!(filer.calls.load(Ordering::SeqCst), 0);

    let row = tracker
        .get_status("corps-flow", "BC0000001")
        .await
        .unwrap()
        .expect("tracker row");
    assert_eq!(row.status().unwrap(), Some(ProcessedStatus::Failed));
    assert_eq!(row.failed_event_id, Some(101));
    assert_eq!(row.failed_event_file_type.as_deref(), Some("FILE_ICORP"));
    assert!(row.last_error.as_deref().unwrap_or("").contains("businesses"));
}

#[tokio::test]
async fn test_business_number_assigned_later_reaches_lear() {
    let dbs = setup_databases().await;
    seed_bc0000003(&dbs.colin).await;
    let config = test_config(FlowKind::Corps);
    let tracker = ProcessingStatusService::new(dbs.colin.clone(), TEST_ENV);
    let filer = CountingFiler::default();
    let corp = summary("BC0000003", "GAMMA VENTURES LTD.");

    // Incorporate before the business number exists
    let records = transformed_records(&dbs, "BC0000003").await;
    Loader::new(&config, &dbs.lear, &tracker, &filer)
        .load_business(&corp, &records[..1])
        .await
        .unwrap();

    sqlx::query("UPDATE corporation SET bn_15 = '123456789BC0001' WHERE corp_num = 'BC0000003'")
        .execute(&dbs.colin)
        .await
        .unwrap();
    let records = transformed_records(&dbs, "BC0000003").await;
    let outcome = Loader::new(&config, &dbs.lear, &tracker, &filer)
        .load_business(&corp, &records)
        .await
        .unwrap();
    assert_eq!(outcome.applied, vec![302]);

    let tax_id: Option<String> =
        sqlx::query_scalar("SELECT tax_id FROM businesses WHERE identifier = 'BC0000003'")
            .fetch_one(&dbs.lear)
            .await
            .unwrap();
    assert_eq!(tax_id.as_deref(), Some("123456789BC0001"));
}
