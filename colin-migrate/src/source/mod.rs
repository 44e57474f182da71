//! Event source reader
//!
//! Read-only access to the COLIN extract. The one write-adjacent query is the
//! batch selection, which joins against the tracker table to find businesses
//! that still need migrating.

pub mod queries;
pub mod rows;

use colin_common::MigrationConfig;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{MigrationError, MigrationResult};
use crate::models::event::lear_identifier;
use crate::models::{
    Alias, AmalgamatingBusiness, BusinessSnapshot, CorpSummary, FilingData, Office, Party,
    Resolution, ShareClass, SourceEvent,
};
use queries::{push_scope, push_str_list, Scope};
use rows::{
    AliasRow, AmalgamationRow, BusinessRow, CandidateRow, DescriptionRow, OfficeRow, PartyRow,
    ResolutionRow, ShareClassRow,
};

/// Full current row-set for one business
#[derive(Debug, Clone, Default)]
pub struct CorpDataset {
    pub business: Option<BusinessSnapshot>,
    pub offices: Vec<Office>,
    pub parties: Vec<Party>,
    pub share_classes: Vec<ShareClass>,
    pub aliases: Vec<Alias>,
    pub resolutions: Vec<Resolution>,
    /// Events in processing order
    pub filings: Vec<SourceEvent>,
    pub amalgamations: Vec<AmalgamatingBusiness>,
}

impl CorpDataset {
    pub fn event_ids(&self) -> Vec<i64> {
        self.filings.iter().map(|e| e.event_id).collect()
    }
}

struct Sections {
    business: Option<BusinessSnapshot>,
    offices: Vec<Office>,
    parties: Vec<Party>,
    share_classes: Vec<ShareClass>,
    aliases: Vec<Alias>,
    resolutions: Vec<Resolution>,
}

/// Reader over the COLIN extract
#[derive(Clone)]
pub struct ColinReader {
    pool: SqlitePool,
}

impl ColinReader {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Select the next batch of businesses for this flow and environment
    ///
    /// A business is a candidate when its corp type is allowed, it has no
    /// dissolution in progress, and it has no tracker row (or, with
    /// `reprocess_failed`, a row left FAILED, PARTIAL or PROCESSING).
    /// COMPLETED businesses are never returned. Never-started businesses sort
    /// first.
    pub async fn get_unprocessed_corps(
        &self,
        config: &MigrationConfig,
        corp_nums: Option<&[String]>,
    ) -> MigrationResult<Vec<CorpSummary>> {
        if config.corp_types.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(queries::UNPROCESSED_SELECT);
        qb.push_bind(config.flow.flow_name());
        qb.push(" AND cp.environment = ");
        qb.push_bind(config.data_load_env.clone());
        qb.push(" WHERE c.corp_type_cd IN ");
        push_str_list(&mut qb, &config.corp_types);
        qb.push(format!(
            " AND NOT EXISTS (SELECT 1 FROM corp_state ds \
               WHERE ds.corp_num = c.corp_num AND ds.end_event_id IS NULL \
                 AND ds.state_type_cd IN ({}))",
            queries::OPEN_DISSOLUTION_STATES
        ));

        if let Some(nums) = corp_nums {
            if nums.is_empty() {
                return Ok(Vec::new());
            }
            qb.push(" AND c.corp_num IN ");
            push_str_list(&mut qb, nums);
        }

        qb.push(" AND (cp.id IS NULL");
        if config.reprocess_failed {
            qb.push(" OR cp.processed_status IN ('FAILED', 'PARTIAL', 'PROCESSING')");
        }
        qb.push(") ORDER BY CASE WHEN cp.id IS NULL THEN 0 ELSE 1 END, c.corp_num LIMIT ");
        qb.push_bind(config.batch_size as i64);

        let rows: Vec<CandidateRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        debug!(
            flow_name = config.flow.flow_name(),
            environment = %config.data_load_env,
            selected = rows.len(),
            "Selected unprocessed businesses"
        );

        Ok(rows
            .into_iter()
            .map(|row| CorpSummary {
                corp_num: row.corp_num,
                corp_type_cd: row.corp_type_cd,
                corp_name: row.corp_name,
            })
            .collect())
    }

    /// Events for one business in processing order
    pub async fn fetch_events(&self, corp_num: &str) -> MigrationResult<Vec<SourceEvent>> {
        let events = sqlx::query_as::<_, SourceEvent>(queries::EVENTS_SELECT)
            .bind(corp_num)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    /// Current state of one business plus its full event stream
    ///
    /// An unknown corp number yields an empty dataset.
    pub async fn fetch_corp_dataset(&self, corp_num: &str) -> MigrationResult<CorpDataset> {
        let sections = self.fetch_sections(corp_num, Scope::Current).await?;
        let filings = self.fetch_events(corp_num).await?;

        let corp_type = sections
            .business
            .as_ref()
            .map(|b| b.corp_type_cd.clone())
            .unwrap_or_default();
        let amalgamations = sqlx::query_as::<_, AmalgamationRow>(queries::AMALGAMATIONS_BY_CORP)
            .bind(corp_num)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.to_amalgamating(&corp_type))
            .collect();

        Ok(CorpDataset {
            business: sections.business,
            offices: sections.offices,
            parties: sections.parties,
            share_classes: sections.share_classes,
            aliases: sections.aliases,
            resolutions: sections.resolutions,
            filings,
            amalgamations,
        })
    }

    /// Business state as of `event`
    ///
    /// `prev_event_ids` are all of this business's events before `event`.
    /// Values the snapshot lacks are carried forward from `previous`.
    pub async fn fetch_filing_data(
        &self,
        corp_num: &str,
        event: &SourceEvent,
        prev_event_ids: &[i64],
        previous: Option<&FilingData>,
    ) -> MigrationResult<FilingData> {
        let mut as_of = Vec::with_capacity(prev_event_ids.len() + 1);
        as_of.extend_from_slice(prev_event_ids);
        as_of.push(event.event_id);

        let sections = self.fetch_sections(corp_num, Scope::AsOf(&as_of)).await?;
        let business = sections.business.ok_or_else(|| {
            MigrationError::MissingData(format!("corporation row for {}", corp_num))
        })?;

        let amalgamations = sqlx::query_as::<_, AmalgamationRow>(queries::AMALGAMATIONS_BY_EVENT)
            .bind(event.event_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.to_amalgamating(&business.corp_type_cd))
            .collect();

        let mut data = FilingData {
            event: event.clone(),
            business,
            offices: sections.offices,
            parties: sections.parties,
            share_classes: sections.share_classes,
            aliases: sections.aliases,
            resolutions: sections.resolutions,
            amalgamations,
        };
        data.carry_forward(previous);
        Ok(data)
    }

    async fn fetch_sections(&self, corp_num: &str, scope: Scope<'_>) -> MigrationResult<Sections> {
        let business = self.fetch_business(corp_num, scope).await?;

        let offices = self
            .fetch_scoped::<OfficeRow>(queries::OFFICES_SELECT, "o", queries::OFFICES_ORDER, corp_num, scope)
            .await?
            .into_iter()
            .map(Office::from)
            .collect();
        let parties = self
            .fetch_scoped::<PartyRow>(queries::PARTIES_SELECT, "p", queries::PARTIES_ORDER, corp_num, scope)
            .await?
            .into_iter()
            .map(Party::from)
            .collect();
        let share_classes = self
            .fetch_scoped::<ShareClassRow>(
                queries::SHARE_CLASSES_SELECT,
                "s",
                queries::SHARE_CLASSES_ORDER,
                corp_num,
                scope,
            )
            .await?
            .into_iter()
            .map(ShareClass::from)
            .collect();
        let aliases = self
            .fetch_scoped::<AliasRow>(queries::ALIASES_SELECT, "a", queries::ALIASES_ORDER, corp_num, scope)
            .await?
            .into_iter()
            .map(Alias::from)
            .collect();
        let resolutions = self
            .fetch_scoped::<ResolutionRow>(
                queries::RESOLUTIONS_SELECT,
                "r",
                queries::RESOLUTIONS_ORDER,
                corp_num,
                scope,
            )
            .await?
            .into_iter()
            .map(Resolution::from)
            .collect();

        Ok(Sections {
            business,
            offices,
            parties,
            share_classes,
            aliases,
            resolutions,
        })
    }

    async fn fetch_business(
        &self,
        corp_num: &str,
        scope: Scope<'_>,
    ) -> MigrationResult<Option<BusinessSnapshot>> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(queries::business_select());
        push_scope(&mut qb, "cn", scope);
        qb.push(queries::BUSINESS_STATE_JOIN);
        push_scope(&mut qb, "cs", scope);
        qb.push(" WHERE c.corp_num = ");
        qb.push_bind(corp_num.to_string());
        qb.push(" LIMIT 1");

        let Some(row) = qb.build_query_as::<BusinessRow>().fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let description = self
            .fetch_scoped::<DescriptionRow>(
                queries::DESCRIPTION_SELECT,
                "bd",
                queries::DESCRIPTION_ORDER,
                corp_num,
                scope,
            )
            .await?
            .into_iter()
            .next();

        let tax_id = row.tax_id();
        Ok(Some(BusinessSnapshot {
            identifier: lear_identifier(&row.corp_num, &row.corp_type_cd),
            corp_num: row.corp_num,
            corp_type_cd: row.corp_type_cd,
            legal_name: row.corp_name,
            op_state_type_cd: row.op_state_type_cd,
            state_type_cd: row.state_type_cd,
            founding_date: row.founding_date,
            tax_id,
            admin_email: row.admin_email,
            last_ar_date: row.last_ar_filed_dt,
            naics_code: description.as_ref().and_then(|d| d.naics_code.clone()),
            naics_description: description.and_then(|d| d.description),
        }))
    }

    /// `select` ends with `corp_num = `; the bind, scope and `order` follow
    async fn fetch_scoped<T>(
        &self,
        select: &str,
        alias: &str,
        order: &str,
        corp_num: &str,
        scope: Scope<'_>,
    ) -> MigrationResult<Vec<T>>
    where
        T: for<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin,
    {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(select);
        qb.push_bind(corp_num.to_string());
        push_scope(&mut qb, alias, scope);
        qb.push(order);
        let rows = qb.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok(rows)
    }
}
