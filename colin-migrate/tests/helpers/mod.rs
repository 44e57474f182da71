//! Shared fixtures for colin-migrate integration tests
//!
//! Each test gets its own pair of single-connection in-memory databases: a
//! COLIN extract (with the tracker table) and an empty LEAR registry.

#![allow(dead_code)]

use colin_common::db::{init_colin_fixture_database, init_lear_database, memory_pool};
use colin_common::{FlowKind, MigrationConfig};
use sqlx::SqlitePool;

pub const TEST_ENV: &str = "test";

pub struct TestDbs {
    pub colin: SqlitePool,
    pub lear: SqlitePool,
}

pub async fn setup_databases() -> TestDbs {
    let colin = memory_pool().await.unwrap();
    init_colin_fixture_database(&colin).await.unwrap();
    let lear = memory_pool().await.unwrap();
    init_lear_database(&lear).await.unwrap();
    TestDbs { colin, lear }
}

pub fn test_config(flow: FlowKind) -> MigrationConfig {
    let mut config = MigrationConfig::new(flow, "sqlite::memory:", "sqlite::memory:");
    config.data_load_env = TEST_ENV.to_string();
    config.batch_size = 10;
    config.max_concurrency = 2;
    config
}

pub async fn insert_corporation(pool: &SqlitePool, corp_num: &str, corp_type: &str) {
    sqlx::query("INSERT INTO corporation (corp_num, corp_type_cd) VALUES (?, ?)")
        .bind(corp_num)
        .bind(corp_type)
        .execute(pool)
        .await
        .unwrap();
}

/// Event with an optional filing row
pub async fn insert_event(
    pool: &SqlitePool,
    event_id: i64,
    corp_num: &str,
    event_type: &str,
    timestamp: &str,
    filing_type: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO event (event_id, corp_num, event_type_cd, event_timestmp) VALUES (?, ?, ?, ?)",
    )
    .bind(event_id)
    .bind(corp_num)
    .bind(event_type)
    .bind(timestamp)
    .execute(pool)
    .await
    .unwrap();

    if let Some(filing_type) = filing_type {
        sqlx::query("INSERT INTO filing (event_id, filing_type_cd) VALUES (?, ?)")
            .bind(event_id)
            .bind(filing_type)
            .execute(pool)
            .await
            .unwrap();
    }
}

/// `FILE` event whose filing corrects `corrected_event_id`
pub async fn insert_correction(
    pool: &SqlitePool,
    event_id: i64,
    corp_num: &str,
    timestamp: &str,
    filing_type: &str,
    corrected_event_id: i64,
) {
    insert_event(pool, event_id, corp_num, "FILE", timestamp, None).await;
    sqlx::query(
        "INSERT INTO filing (event_id, filing_type_cd, corrected_event_id) VALUES (?, ?, ?)",
    )
    .bind(event_id)
    .bind(filing_type)
    .bind(corrected_event_id)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_corp_name(pool: &SqlitePool, corp_num: &str, name: &str, start_event_id: i64) {
    sqlx::query(
        "INSERT INTO corp_name (corp_num, corp_name_typ_cd, corp_nme, start_event_id) VALUES (?, 'CO', ?, ?)",
    )
    .bind(corp_num)
    .bind(name)
    .bind(start_event_id)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_corp_state(
    pool: &SqlitePool,
    corp_num: &str,
    state_type: &str,
    op_state_type: &str,
    start_event_id: i64,
) {
    sqlx::query(
        "INSERT INTO corp_state (corp_num, state_type_cd, op_state_type_cd, start_event_id) VALUES (?, ?, ?, ?)",
    )
    .bind(corp_num)
    .bind(state_type)
    .bind(op_state_type)
    .bind(start_event_id)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_address(pool: &SqlitePool, addr_id: i64, street: &str) {
    sqlx::query(
        r#"
        INSERT INTO address (addr_id, addr_line_1, city, province, country_typ_cd, postal_cd)
        VALUES (?, ?, 'Victoria', 'BC', 'CA', 'V8W 1A1')
        "#,
    )
    .bind(addr_id)
    .bind(street)
    .execute(pool)
    .await
    .unwrap();
}

/// Close the open registered office at `event_id` and open one at `street`
pub async fn change_registered_office(pool: &SqlitePool, corp_num: &str, event_id: i64, street: &str) {
    sqlx::query(
        "UPDATE office SET end_event_id = ? WHERE corp_num = ? AND office_typ_cd = 'RG' AND end_event_id IS NULL",
    )
    .bind(event_id)
    .bind(corp_num)
    .execute(pool)
    .await
    .unwrap();
    open_registered_office(pool, corp_num, event_id, street).await;
}

async fn open_registered_office(pool: &SqlitePool, corp_num: &str, event_id: i64, street: &str) {
    insert_address(pool, event_id, street).await;
    sqlx::query(
        r#"
        INSERT INTO office (corp_num, office_typ_cd, start_event_id, mailing_addr_id, delivery_addr_id)
        VALUES (?, 'RG', ?, ?, ?)
        "#,
    )
    .bind(corp_num)
    .bind(event_id)
    .bind(event_id)
    .bind(event_id)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn insert_director(
    pool: &SqlitePool,
    corp_party_id: i64,
    corp_num: &str,
    first_name: &str,
    last_name: &str,
    start_event_id: i64,
) {
    sqlx::query(
        r#"
        INSERT INTO corp_party (
            corp_party_id, corp_num, party_typ_cd, first_nme, last_nme,
            appointment_dt, start_event_id
        ) VALUES (?, ?, 'DIR', ?, ?, '2020-01-15', ?)
        "#,
    )
    .bind(corp_party_id)
    .bind(corp_num)
    .bind(first_name)
    .bind(last_name)
    .bind(start_event_id)
    .execute(pool)
    .await
    .unwrap();
}

/// Corp incorporated by `FILE_ICORP` event `event_id`
///
/// Opens a name, an active state, a registered office and one director at
/// that event. Address and party ids reuse the event id.
pub async fn seed_incorporated_corp(
    pool: &SqlitePool,
    corp_num: &str,
    event_id: i64,
    timestamp: &str,
    name: &str,
) {
    insert_corporation(pool, corp_num, "BC").await;
    insert_event(pool, event_id, corp_num, "FILE", timestamp, Some("ICORP")).await;
    insert_corp_name(pool, corp_num, name, event_id).await;
    insert_corp_state(pool, corp_num, "ACT", "ACT", event_id).await;
    open_registered_office(pool, corp_num, event_id, "100 Founding St").await;
    insert_director(pool, event_id, corp_num, "Jane", "Doe", event_id).await;
}

/// Incorporation, address change, then a correction of the address change
pub async fn seed_bc0000001(pool: &SqlitePool) {
    seed_incorporated_corp(pool, "BC0000001", 101, "2020-01-15 10:00:00", "ACME WIDGETS LTD.").await;
    insert_event(pool, 102, "BC0000001", "FILE", "2020-03-01 09:00:00", Some("NOCAD")).await;
    change_registered_office(pool, "BC0000001", 102, "200 Wrong Way").await;
    insert_correction(pool, 103, "BC0000001", "2020-03-05 09:00:00", "CO_AD", 102).await;
    change_registered_office(pool, "BC0000001", 103, "300 Right Rd").await;
}

/// Incorporation followed by a filing type with no LEAR counterpart
pub async fn seed_bc0000002(pool: &SqlitePool) {
    seed_incorporated_corp(pool, "BC0000002", 201, "2020-01-20 10:00:00", "BETA HOLDINGS INC.").await;
    insert_event(pool, 202, "BC0000002", "FILE", "2020-02-01 09:00:00", Some("XXXXX")).await;
}

/// Incorporation followed by a plain address change
pub async fn seed_bc0000003(pool: &SqlitePool) {
    seed_incorporated_corp(pool, "BC0000003", 301, "2020-01-25 10:00:00", "GAMMA VENTURES LTD.").await;
    insert_event(pool, 302, "BC0000003", "FILE", "2020-04-01 09:00:00", Some("NOCAD")).await;
    change_registered_office(pool, "BC0000003", 302, "302 Moved Ave").await;
}

pub async fn lear_business_id(pool: &SqlitePool, identifier: &str) -> Option<i64> {
    sqlx::query_scalar("SELECT id FROM businesses WHERE identifier = ?")
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .unwrap()
}

/// Delivery street of the active registered office
pub async fn active_registered_street(pool: &SqlitePool, business_id: i64) -> Option<String> {
    sqlx::query_scalar(
        r#"
        SELECT a.street
          FROM offices o
          JOIN addresses a ON a.office_id = o.id AND a.address_type = 'delivery'
         WHERE o.business_id = ? AND o.office_type = 'registeredOffice'
           AND o.deactivated_date IS NULL
        "#,
    )
    .bind(business_id)
    .fetch_optional(pool)
    .await
    .unwrap()
}
