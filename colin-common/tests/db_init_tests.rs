//! Integration tests for database initialization

use colin_common::db::{init_colin_fixture_database, init_lear_database, memory_pool};

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_colin_fixture_schema_created() {
    let pool = memory_pool().await.unwrap();
    init_colin_fixture_database(&pool).await.unwrap();

    let tables = table_names(&pool).await;
    for expected in [
        "corp_processing",
        "corporation",
        "event",
        "filing",
        "corp_name",
        "corp_state",
        "office",
        "address",
        "corp_party",
        "share_struct_cls",
        "resolution",
        "business_description",
        "corp_involved_amalgamating",
    ] {
        assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_lear_schema_created() {
    let pool = memory_pool().await.unwrap();
    init_lear_database(&pool).await.unwrap();

    let tables = table_names(&pool).await;
    for expected in [
        "businesses",
        "filings",
        "offices",
        "addresses",
        "parties",
        "party_roles",
        "share_classes",
        "aliases",
        "resolutions",
        "amalgamating_businesses",
    ] {
        assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_initialization_is_idempotent() {
    let pool = memory_pool().await.unwrap();
    init_colin_fixture_database(&pool).await.unwrap();
    init_colin_fixture_database(&pool).await.unwrap();
    init_lear_database(&pool).await.unwrap();
    init_lear_database(&pool).await.unwrap();
}

#[tokio::test]
async fn test_tracker_key_is_unique() {
    let pool = memory_pool().await.unwrap();
    init_colin_fixture_database(&pool).await.unwrap();

    let insert = "INSERT INTO corp_processing (corp_num, flow_name, environment) VALUES ('BC0000001', 'corps-flow', 'dev')";
    sqlx::query(insert).execute(&pool).await.unwrap();
    assert!(sqlx::query(insert).execute(&pool).await.is_err());

    // Same corp in another environment is a separate row
    sqlx::query("INSERT INTO corp_processing (corp_num, flow_name, environment) VALUES ('BC0000001', 'corps-flow', 'test')")
        .execute(&pool)
        .await
        .unwrap();
}
