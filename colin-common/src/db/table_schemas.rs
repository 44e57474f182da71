//! Table definitions
//!
//! Three groups:
//! - `corp_processing`: the progress tracker, one row per (corp, flow, environment)
//! - COLIN extract: the legacy event store the flows read from
//! - LEAR: the registry tables the loader and filer write to
//!
//! All statements are idempotent (`IF NOT EXISTS`).

use crate::Result;
use sqlx::SqlitePool;

async fn execute_all(pool: &SqlitePool, statements: &[&str]) -> Result<()> {
    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Progress tracker table
pub async fn create_tracker_table(pool: &SqlitePool) -> Result<()> {
    execute_all(
        pool,
        &[
            r#"
            CREATE TABLE IF NOT EXISTS corp_processing (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                corp_num TEXT NOT NULL,
                corp_name TEXT,
                corp_type_cd TEXT,
                flow_name TEXT NOT NULL,
                environment TEXT NOT NULL,
                processed_status TEXT,
                filings_count INTEGER,
                last_processed_event_id INTEGER,
                failed_event_id INTEGER,
                failed_event_file_type TEXT,
                last_error TEXT,
                flow_run_id TEXT,
                create_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                last_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (corp_num, flow_name, environment)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_corp_processing_status ON corp_processing (flow_name, environment, processed_status)",
        ],
    )
    .await
}

/// Legacy extract schema
///
/// Temporal validity of sub-records is modelled with `start_event_id` /
/// `end_event_id`; an open row has `end_event_id IS NULL`.
pub async fn create_colin_extract_tables(pool: &SqlitePool) -> Result<()> {
    execute_all(
        pool,
        &[
            r#"
            CREATE TABLE IF NOT EXISTS corporation (
                corp_num TEXT PRIMARY KEY,
                corp_type_cd TEXT NOT NULL,
                recognition_dts TEXT,
                bn_9 TEXT,
                bn_15 TEXT,
                admin_email TEXT,
                last_ar_filed_dt TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS event (
                event_id INTEGER PRIMARY KEY,
                corp_num TEXT NOT NULL,
                event_type_cd TEXT NOT NULL,
                event_timestmp TEXT NOT NULL,
                trigger_dts TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_event_corp ON event (corp_num)",
            r#"
            CREATE TABLE IF NOT EXISTS filing (
                event_id INTEGER PRIMARY KEY,
                filing_type_cd TEXT NOT NULL,
                effective_dt TEXT,
                period_end_dt TEXT,
                court_order_num TEXT,
                arrangement_ind TEXT,
                corrected_event_id INTEGER,
                withdrawn_event_id INTEGER,
                nr_num TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS corp_name (
                corp_num TEXT NOT NULL,
                corp_name_typ_cd TEXT NOT NULL,
                corp_nme TEXT NOT NULL,
                start_event_id INTEGER NOT NULL,
                end_event_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS corp_state (
                corp_num TEXT NOT NULL,
                state_type_cd TEXT NOT NULL,
                op_state_type_cd TEXT NOT NULL,
                start_event_id INTEGER NOT NULL,
                end_event_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS address (
                addr_id INTEGER PRIMARY KEY,
                addr_line_1 TEXT,
                addr_line_2 TEXT,
                addr_line_3 TEXT,
                city TEXT,
                province TEXT,
                country_typ_cd TEXT,
                postal_cd TEXT,
                delivery_instructions TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS office (
                corp_num TEXT NOT NULL,
                office_typ_cd TEXT NOT NULL,
                start_event_id INTEGER NOT NULL,
                end_event_id INTEGER,
                mailing_addr_id INTEGER,
                delivery_addr_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS corp_party (
                corp_party_id INTEGER PRIMARY KEY,
                corp_num TEXT NOT NULL,
                party_typ_cd TEXT NOT NULL,
                first_nme TEXT,
                middle_nme TEXT,
                last_nme TEXT,
                business_nme TEXT,
                bus_company_num TEXT,
                email_address TEXT,
                appointment_dt TEXT,
                cessation_dt TEXT,
                start_event_id INTEGER NOT NULL,
                end_event_id INTEGER,
                mailing_addr_id INTEGER,
                delivery_addr_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS share_struct_cls (
                share_class_id INTEGER NOT NULL,
                corp_num TEXT NOT NULL,
                class_nme TEXT NOT NULL,
                currency_typ_cd TEXT,
                max_share_ind TEXT,
                share_quantity INTEGER,
                spec_rights_ind TEXT,
                par_value_ind TEXT,
                par_value_amt REAL,
                seq_num INTEGER,
                start_event_id INTEGER NOT NULL,
                end_event_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS resolution (
                corp_num TEXT NOT NULL,
                resolution_dt TEXT,
                resolution_type_cd TEXT,
                start_event_id INTEGER NOT NULL,
                end_event_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS business_description (
                corp_num TEXT NOT NULL,
                naics_code TEXT,
                description TEXT,
                start_event_id INTEGER NOT NULL,
                end_event_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS corp_involved_amalgamating (
                event_id INTEGER NOT NULL,
                corp_involve_id INTEGER NOT NULL,
                ted_corp_num TEXT NOT NULL,
                ting_corp_num TEXT NOT NULL,
                adopted_corp_ind TEXT
            )
            "#,
        ],
    )
    .await
}

/// LEAR registry tables
pub async fn create_lear_tables(pool: &SqlitePool) -> Result<()> {
    execute_all(
        pool,
        &[
            r#"
            CREATE TABLE IF NOT EXISTS businesses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier TEXT NOT NULL UNIQUE,
                legal_name TEXT,
                legal_type TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'ACTIVE',
                founding_date TEXT,
                dissolution_date TEXT,
                restoration_expiry_date TEXT,
                last_ar_date TEXT,
                tax_id TEXT,
                admin_email TEXT,
                naics_code TEXT,
                naics_description TEXT,
                last_modified TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS filings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id INTEGER,
                colin_event_id INTEGER NOT NULL UNIQUE,
                filing_type TEXT NOT NULL,
                filing_json TEXT NOT NULL,
                effective_date TEXT,
                filing_date TEXT,
                status TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT 'COLIN'
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_filings_business ON filings (business_id)",
            r#"
            CREATE TABLE IF NOT EXISTS offices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id INTEGER NOT NULL,
                office_type TEXT NOT NULL,
                deactivated_date TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS parties (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                party_type TEXT NOT NULL,
                first_name TEXT,
                middle_initial TEXT,
                last_name TEXT,
                organization_name TEXT,
                identifier TEXT,
                email TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS addresses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                office_id INTEGER,
                party_id INTEGER,
                address_type TEXT NOT NULL,
                street TEXT,
                street_additional TEXT,
                city TEXT,
                region TEXT,
                postal_code TEXT,
                country TEXT,
                delivery_instructions TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS party_roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id INTEGER NOT NULL,
                party_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                appointment_date TEXT,
                cessation_date TEXT,
                filing_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS share_classes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                priority INTEGER,
                max_share_flag INTEGER NOT NULL DEFAULT 0,
                max_shares INTEGER,
                par_value_flag INTEGER NOT NULL DEFAULT 0,
                par_value REAL,
                currency TEXT,
                special_rights_flag INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS aliases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id INTEGER NOT NULL,
                alias TEXT NOT NULL,
                type TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS resolutions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id INTEGER NOT NULL,
                resolution_date TEXT,
                resolution_type TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS amalgamating_businesses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filing_id INTEGER NOT NULL,
                business_id INTEGER NOT NULL,
                amalgamating_identifier TEXT NOT NULL,
                role TEXT NOT NULL
            )
            "#,
        ],
    )
    .await
}
