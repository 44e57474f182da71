//! Integration tests for the COLIN event source reader
//!
//! Batch selection rules and as-of reconstruction of temporal rows.

mod helpers;

use colin_common::FlowKind;
use colin_migrate::db::{FlowStatusUpdate, ProcessingStatusService};
use colin_migrate::source::ColinReader;
use helpers::*;

fn corp_nums(corps: &[colin_migrate::models::CorpSummary]) -> Vec<&str> {
    corps.iter().map(|c| c.corp_num.as_str()).collect()
}

/// Six corps covering every selection rule
async fn seed_selection_candidates(dbs: &TestDbs) {
    let pool = &dbs.colin;
    insert_corporation(pool, "BC0000010", "BC").await;
    insert_corporation(pool, "BC0000011", "BC").await;
    insert_corp_state(pool, "BC0000011", "D1A", "ACT", 1).await;
    insert_corporation(pool, "FM0000012", "SP").await;
    insert_corporation(pool, "BC0000013", "BC").await;
    insert_corporation(pool, "BC0000014", "BC").await;
    insert_corporation(pool, "BC0000015", "ULC").await;

    let tracker = ProcessingStatusService::new(pool.clone(), TEST_ENV);
    tracker
        .update_flow_status("corps-flow", "BC0000013", FlowStatusUpdate::completed(Some(1), 1))
        .await
        .unwrap();
    tracker
        .update_flow_status(
            "corps-flow",
            "BC0000014",
            FlowStatusUpdate::failed(Some(7), Some("FILE_NOCAD".to_string()), "boom"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_batch_selects_never_started_first() {
    let dbs = setup_databases().await;
    seed_selection_candidates(&dbs).await;
    let reader = ColinReader::new(dbs.colin.clone());

    let corps = reader
        .get_unprocessed_corps(&test_config(FlowKind::Corps), None)
        .await
        .unwrap();

    // Open dissolution (BC0000011), completed (BC0000013) and firm excluded
    assert_eq!(corp_nums(&corps), vec!["BC0000010", "BC0000015", "BC0000014"]);
}

#[tokio::test]
async fn test_batch_without_reprocess_skips_failed() {
    let dbs = setup_databases().await;
    seed_selection_candidates(&dbs).await;
    let reader = ColinReader::new(dbs.colin.clone());

    let mut config = test_config(FlowKind::Corps);
    config.reprocess_failed = false;
    let corps = reader.get_unprocessed_corps(&config, None).await.unwrap();

    assert_eq!(corp_nums(&corps), vec!["BC0000010", "BC0000015"]);
}

#[tokio::test]
async fn test_batch_size_limits_selection() {
    let dbs = setup_databases().await;
    seed_selection_candidates(&dbs).await;
    let reader = ColinReader::new(dbs.colin.clone());

    let mut config = test_config(FlowKind::Corps);
    config.batch_size = 1;
    let corps = reader.get_unprocessed_corps(&config, None).await.unwrap();

    assert_eq!(corp_nums(&corps), vec!["BC0000010"]);
}

#[tokio::test]
async fn test_batch_restricted_to_corp_list() {
    let dbs = setup_databases().await;
    seed_selection_candidates(&dbs).await;
    let reader = ColinReader::new(dbs.colin.clone());

    let wanted = vec!["BC0000013".to_string(), "BC0000014".to_string()];
    let corps = reader
        .get_unprocessed_corps(&test_config(FlowKind::Corps), Some(wanted.as_slice()))
        .await
        .unwrap();

    assert_eq!(corp_nums(&corps), vec!["BC0000014"]);
}

#[tokio::test]
async fn test_firms_flow_selects_firm_types_only() {
    let dbs = setup_databases().await;
    seed_selection_candidates(&dbs).await;
    let reader = ColinReader::new(dbs.colin.clone());

    let corps = reader
        .get_unprocessed_corps(&test_config(FlowKind::Firms), None)
        .await
        .unwrap();

    assert_eq!(corp_nums(&corps), vec!["FM0000012"]);
    assert_eq!(corps[0].identifier(), "FM0000012");
}

#[tokio::test]
async fn test_tracker_rows_are_per_environment() {
    let dbs = setup_databases().await;
    seed_selection_candidates(&dbs).await;

    let prod = ProcessingStatusService::new(dbs.colin.clone(), "prod");
    prod.update_flow_status("corps-flow", "BC0000010", FlowStatusUpdate::completed(None, 0))
        .await
        .unwrap();

    let reader = ColinReader::new(dbs.colin.clone());
    let corps = reader
        .get_unprocessed_corps(&test_config(FlowKind::Corps), None)
        .await
        .unwrap();

    assert!(corp_nums(&corps).contains(&"BC0000010"));
}

#[tokio::test]
async fn test_events_ordered_by_timestamp_then_id() {
    let dbs = setup_databases().await;
    let pool = &dbs.colin;
    insert_corporation(pool, "BC0000020", "BC").await;
    insert_event(pool, 503, "BC0000020", "FILE", "2020-05-01 09:00:00", Some("NOCAD")).await;
    insert_event(pool, 502, "BC0000020", "FILE", "2020-01-01 09:00:00", Some("ICORP")).await;
    insert_event(pool, 501, "BC0000020", "FILE", "2020-05-01 09:00:00", Some("NOCDR")).await;

    let reader = ColinReader::new(pool.clone());
    let events = reader.fetch_events("BC0000020").await.unwrap();
    let ids: Vec<i64> = events.iter().map(|e| e.event_id).collect();

    assert_eq!(ids, vec![502, 501, 503]);
    assert_eq!(events[0].event_file_type().as_str(), "FILE_ICORP");
}

#[tokio::test]
async fn test_unknown_corp_yields_empty_dataset() {
    let dbs = setup_databases().await;
    let reader = ColinReader::new(dbs.colin.clone());

    let dataset = reader.fetch_corp_dataset("BC9999999").await.unwrap();

    assert!(dataset.business.is_none());
    assert!(dataset.filings.is_empty());
    assert!(dataset.offices.is_empty());
}

#[tokio::test]
async fn test_current_dataset_has_open_rows_only() {
    let dbs = setup_databases().await;
    seed_bc0000001(&dbs.colin).await;
    let reader = ColinReader::new(dbs.colin.clone());

    let dataset = reader.fetch_corp_dataset("BC0000001").await.unwrap();

    let business = dataset.business.as_ref().expect("business row");
    assert_eq!(business.legal_name.as_deref(), Some("ACME WIDGETS LTD."));
    assert_eq!(business.identifier, "BC0000001");
    assert_eq!(dataset.event_ids(), vec![101, 102, 103]);
    assert_eq!(dataset.offices.len(), 1);
    assert_eq!(
        dataset.offices[0].delivery.as_ref().and_then(|a| a.street.as_deref()),
        Some("300 Right Rd")
    );
    assert_eq!(dataset.parties.len(), 1);
}

#[tokio::test]
async fn test_filing_data_reflects_state_as_of_event() {
    let dbs = setup_databases().await;
    seed_bc0000001(&dbs.colin).await;
    let reader = ColinReader::new(dbs.colin.clone());
    let events = reader.fetch_events("BC0000001").await.unwrap();

    let at_incorporation = reader
        .fetch_filing_data("BC0000001", &events[0], &[], None)
        .await
        .unwrap();
    let at_change = reader
        .fetch_filing_data("BC0000001", &events[1], &[101], Some(&at_incorporation))
        .await
        .unwrap();

    let street = |data: &colin_migrate::models::FilingData| {
        data.offices[0]
            .delivery
            .as_ref()
            .and_then(|a| a.street.clone())
    };
    assert_eq!(at_incorporation.offices.len(), 1);
    assert_eq!(street(&at_incorporation).as_deref(), Some("100 Founding St"));
    assert_eq!(at_change.offices.len(), 1);
    assert_eq!(street(&at_change).as_deref(), Some("200 Wrong Way"));
    // Founding date falls back to the incorporation event's timestamp
    assert_eq!(
        at_change.business.founding_date.map(|d| d.to_string()).as_deref(),
        Some("2020-01-15 10:00:00")
    );
}
