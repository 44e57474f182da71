//! LEAR registry access
//!
//! Lookups take the pool; writes take a `&mut SqliteConnection` so they run
//! inside the loader's per-filing transaction.

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;

use crate::error::MigrationResult;
use crate::models::{Address, ShareClass};

/// Row in `businesses`
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BusinessEntity {
    pub id: i64,
    pub identifier: String,
    pub legal_name: Option<String>,
    pub legal_type: String,
    pub state: String,
    pub founding_date: Option<String>,
    pub dissolution_date: Option<String>,
    pub last_ar_date: Option<String>,
    pub tax_id: Option<String>,
    pub naics_code: Option<String>,
}

const BUSINESS_COLUMNS: &str = "id, identifier, legal_name, legal_type, state, founding_date, \
     dissolution_date, last_ar_date, tax_id, naics_code";

/// Filing row as first written, before the filer runs
#[derive(Debug, Clone)]
pub struct NewFiling<'a> {
    pub business_id: Option<i64>,
    pub colin_event_id: i64,
    pub filing_type: &'a str,
    pub filing_json: String,
    pub effective_date: &'a str,
    pub filing_date: &'a str,
}

/// Fields set when a business is created
#[derive(Debug, Clone)]
pub struct NewBusiness<'a> {
    pub identifier: &'a str,
    pub legal_name: Option<&'a str>,
    pub legal_type: &'a str,
    pub founding_date: Option<&'a str>,
    pub tax_id: Option<&'a str>,
    pub admin_email: Option<&'a str>,
}

/// Which of `event_ids` already have a LEAR filing
pub async fn colin_event_ids_in_lear(
    pool: &SqlitePool,
    event_ids: &[i64],
) -> MigrationResult<HashSet<i64>> {
    if event_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let mut found = HashSet::new();
    // SQLite caps bound parameters per statement
    for chunk in event_ids.chunks(500) {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT colin_event_id FROM filings WHERE colin_event_id IN (");
        let mut separated = qb.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let ids: Vec<i64> = qb.build_query_scalar().fetch_all(pool).await?;
        found.extend(ids);
    }
    Ok(found)
}

pub async fn find_business_by_identifier(
    conn: &mut SqliteConnection,
    identifier: &str,
) -> MigrationResult<Option<BusinessEntity>> {
    let business = sqlx::query_as::<_, BusinessEntity>(&format!(
        "SELECT {} FROM businesses WHERE identifier = ?",
        BUSINESS_COLUMNS
    ))
    .bind(identifier)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(business)
}

pub async fn find_business_by_id(
    conn: &mut SqliteConnection,
    id: i64,
) -> MigrationResult<Option<BusinessEntity>> {
    let business = sqlx::query_as::<_, BusinessEntity>(&format!(
        "SELECT {} FROM businesses WHERE id = ?",
        BUSINESS_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(business)
}

/// Save the filing document; returns the filing id
///
/// `colin_event_id` is unique, so saving the same event twice fails with a
/// unique violation.
pub async fn insert_filing(conn: &mut SqliteConnection, filing: &NewFiling<'_>) -> MigrationResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO filings (
            business_id, colin_event_id, filing_type, filing_json,
            effective_date, filing_date, status, source
        ) VALUES (?, ?, ?, ?, ?, ?, 'PENDING', 'COLIN')
        "#,
    )
    .bind(filing.business_id)
    .bind(filing.colin_event_id)
    .bind(filing.filing_type)
    .bind(&filing.filing_json)
    .bind(filing.effective_date)
    .bind(filing.filing_date)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Link the filing to its business and mark it applied
pub async fn complete_filing(
    conn: &mut SqliteConnection,
    filing_id: i64,
    business_id: i64,
) -> MigrationResult<()> {
    sqlx::query("UPDATE filings SET business_id = ?, status = 'COMPLETED' WHERE id = ?")
        .bind(business_id)
        .bind(filing_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn insert_business(
    conn: &mut SqliteConnection,
    business: &NewBusiness<'_>,
) -> MigrationResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO businesses (
            identifier, legal_name, legal_type, state, founding_date, tax_id, admin_email
        ) VALUES (?, ?, ?, 'ACTIVE', ?, ?, ?)
        "#,
    )
    .bind(business.identifier)
    .bind(business.legal_name)
    .bind(business.legal_type)
    .bind(business.founding_date)
    .bind(business.tax_id)
    .bind(business.admin_email)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_legal_name(
    conn: &mut SqliteConnection,
    business_id: i64,
    legal_name: &str,
) -> MigrationResult<()> {
    sqlx::query(
        "UPDATE businesses SET legal_name = ?, last_modified = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(legal_name)
    .bind(business_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_legal_type(
    conn: &mut SqliteConnection,
    business_id: i64,
    legal_type: &str,
) -> MigrationResult<()> {
    sqlx::query(
        "UPDATE businesses SET legal_type = ?, last_modified = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(legal_type)
    .bind(business_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_tax_id(
    conn: &mut SqliteConnection,
    business_id: i64,
    tax_id: &str,
) -> MigrationResult<()> {
    sqlx::query("UPDATE businesses SET tax_id = ?, last_modified = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(tax_id)
        .bind(business_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn update_naics(
    conn: &mut SqliteConnection,
    business_id: i64,
    naics_code: Option<&str>,
    naics_description: Option<&str>,
) -> MigrationResult<()> {
    sqlx::query(
        r#"
        UPDATE businesses
           SET naics_code = ?, naics_description = ?, last_modified = CURRENT_TIMESTAMP
         WHERE id = ?
        "#,
    )
    .bind(naics_code)
    .bind(naics_description)
    .bind(business_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_last_ar_date(
    conn: &mut SqliteConnection,
    business_id: i64,
    last_ar_date: &str,
) -> MigrationResult<()> {
    sqlx::query(
        "UPDATE businesses SET last_ar_date = ?, last_modified = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(last_ar_date)
    .bind(business_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Set `state`; a dissolution date is recorded for `HISTORICAL`, cleared otherwise
pub async fn update_state(
    conn: &mut SqliteConnection,
    business_id: i64,
    state: &str,
    dissolution_date: Option<&str>,
) -> MigrationResult<()> {
    sqlx::query(
        r#"
        UPDATE businesses
           SET state = ?, dissolution_date = ?, last_modified = CURRENT_TIMESTAMP
         WHERE id = ?
        "#,
    )
    .bind(state)
    .bind(dissolution_date)
    .bind(business_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Deactivate current offices of `office_type` as of `date`
pub async fn deactivate_offices(
    conn: &mut SqliteConnection,
    business_id: i64,
    office_type: &str,
    date: &str,
) -> MigrationResult<()> {
    sqlx::query(
        r#"
        UPDATE offices SET deactivated_date = ?
         WHERE business_id = ? AND office_type = ? AND deactivated_date IS NULL
        "#,
    )
    .bind(date)
    .bind(business_id)
    .bind(office_type)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_office(
    conn: &mut SqliteConnection,
    business_id: i64,
    office_type: &str,
) -> MigrationResult<i64> {
    let result = sqlx::query("INSERT INTO offices (business_id, office_type) VALUES (?, ?)")
        .bind(business_id)
        .bind(office_type)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Owner of an address row
#[derive(Debug, Clone, Copy)]
pub enum AddressOwner {
    Office(i64),
    Party(i64),
}

pub async fn insert_address(
    conn: &mut SqliteConnection,
    owner: AddressOwner,
    address_type: &str,
    address: &Address,
) -> MigrationResult<i64> {
    let (office_id, party_id) = match owner {
        AddressOwner::Office(id) => (Some(id), None),
        AddressOwner::Party(id) => (None, Some(id)),
    };
    let result = sqlx::query(
        r#"
        INSERT INTO addresses (
            office_id, party_id, address_type, street, street_additional,
            city, region, postal_code, country, delivery_instructions
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(office_id)
    .bind(party_id)
    .bind(address_type)
    .bind(&address.street)
    .bind(&address.street_additional)
    .bind(&address.city)
    .bind(&address.region)
    .bind(&address.postal_code)
    .bind(&address.country)
    .bind(&address.delivery_instructions)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Party fields as written to LEAR
#[derive(Debug, Clone)]
pub struct NewParty<'a> {
    pub party_type: &'a str,
    pub first_name: Option<&'a str>,
    pub middle_initial: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub organization_name: Option<&'a str>,
    pub identifier: Option<&'a str>,
    pub email: Option<&'a str>,
}

pub async fn insert_party(conn: &mut SqliteConnection, party: &NewParty<'_>) -> MigrationResult<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO parties (
            party_type, first_name, middle_initial, last_name,
            organization_name, identifier, email
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(party.party_type)
    .bind(party.first_name)
    .bind(party.middle_initial)
    .bind(party.last_name)
    .bind(party.organization_name)
    .bind(party.identifier)
    .bind(party.email)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Cease all active roles named in `roles` as of `date`
pub async fn cease_party_roles(
    conn: &mut SqliteConnection,
    business_id: i64,
    roles: &[&str],
    date: &str,
) -> MigrationResult<()> {
    if roles.is_empty() {
        return Ok(());
    }
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE party_roles SET cessation_date = ");
    qb.push_bind(date.to_string());
    qb.push(" WHERE business_id = ");
    qb.push_bind(business_id);
    qb.push(" AND cessation_date IS NULL AND role IN (");
    let mut separated = qb.separated(", ");
    for role in roles {
        separated.push_bind(role.to_string());
    }
    separated.push_unseparated(")");
    qb.build().execute(&mut *conn).await?;
    Ok(())
}

pub async fn insert_party_role(
    conn: &mut SqliteConnection,
    business_id: i64,
    party_id: i64,
    role: &str,
    appointment_date: Option<NaiveDate>,
    filing_id: i64,
) -> MigrationResult<()> {
    sqlx::query(
        r#"
        INSERT INTO party_roles (business_id, party_id, role, appointment_date, filing_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(business_id)
    .bind(party_id)
    .bind(role)
    .bind(appointment_date.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(filing_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn replace_share_classes(
    conn: &mut SqliteConnection,
    business_id: i64,
    classes: &[ShareClass],
) -> MigrationResult<()> {
    sqlx::query("DELETE FROM share_classes WHERE business_id = ?")
        .bind(business_id)
        .execute(&mut *conn)
        .await?;

    for class in classes {
        sqlx::query(
            r#"
            INSERT INTO share_classes (
                business_id, name, priority, max_share_flag, max_shares,
                par_value_flag, par_value, currency, special_rights_flag
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(business_id)
        .bind(&class.name)
        .bind(class.priority)
        .bind(class.max_share_flag)
        .bind(class.max_shares)
        .bind(class.par_value_flag)
        .bind(class.par_value)
        .bind(&class.currency)
        .bind(class.special_rights_flag)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn replace_aliases(
    conn: &mut SqliteConnection,
    business_id: i64,
    aliases: &[(String, String)],
) -> MigrationResult<()> {
    sqlx::query("DELETE FROM aliases WHERE business_id = ?")
        .bind(business_id)
        .execute(&mut *conn)
        .await?;

    for (alias, alias_type) in aliases {
        sqlx::query("INSERT INTO aliases (business_id, alias, type) VALUES (?, ?, ?)")
            .bind(business_id)
            .bind(alias)
            .bind(alias_type)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Add resolutions not already recorded for this business
pub async fn add_resolutions(
    conn: &mut SqliteConnection,
    business_id: i64,
    resolutions: &[(Option<String>, Option<String>)],
) -> MigrationResult<()> {
    for (date, resolution_type) in resolutions {
        sqlx::query(
            r#"
            INSERT INTO resolutions (business_id, resolution_date, resolution_type)
            SELECT ?, ?, ?
             WHERE NOT EXISTS (
                SELECT 1 FROM resolutions
                 WHERE business_id = ? AND resolution_date IS ? AND resolution_type IS ?)
            "#,
        )
        .bind(business_id)
        .bind(date)
        .bind(resolution_type)
        .bind(business_id)
        .bind(date)
        .bind(resolution_type)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn insert_amalgamating_business(
    conn: &mut SqliteConnection,
    filing_id: i64,
    business_id: i64,
    amalgamating_identifier: &str,
    role: &str,
) -> MigrationResult<()> {
    sqlx::query(
        r#"
        INSERT INTO amalgamating_businesses (filing_id, business_id, amalgamating_identifier, role)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(filing_id)
    .bind(business_id)
    .bind(amalgamating_identifier)
    .bind(role)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Applied filings for a business, in application order
pub async fn filings_for_business(
    pool: &SqlitePool,
    business_id: i64,
) -> MigrationResult<Vec<(i64, String)>> {
    let rows = sqlx::query_as::<_, (i64, String)>(
        "SELECT colin_event_id, filing_type FROM filings WHERE business_id = ? ORDER BY id",
    )
    .bind(business_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
