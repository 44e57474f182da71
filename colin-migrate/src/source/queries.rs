//! SQL text for the COLIN extract
//!
//! Sub-record tables model validity with open/closed event ranges. A row is
//! current when `end_event_id IS NULL`; it is in effect as of a set of events
//! when it was opened by one of them and not closed by any of them. Those
//! predicates are appended by [`push_scope`].

use sqlx::{QueryBuilder, Sqlite};

/// Which rows of a temporal table to read
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Open rows only
    Current,
    /// Rows in effect once these events (prior events plus the current one) applied
    AsOf(&'a [i64]),
}

/// Append the validity predicate for table alias `alias`
pub fn push_scope(qb: &mut QueryBuilder<'_, Sqlite>, alias: &str, scope: Scope<'_>) {
    match scope {
        Scope::Current => {
            qb.push(format!(" AND {}.end_event_id IS NULL", alias));
        }
        Scope::AsOf([]) => {
            qb.push(" AND 0");
        }
        Scope::AsOf(event_ids) => {
            qb.push(format!(" AND {}.start_event_id IN (", alias));
            push_id_list(qb, event_ids);
            qb.push(format!(
                ") AND ({0}.end_event_id IS NULL OR {0}.end_event_id NOT IN (",
                alias
            ));
            push_id_list(qb, event_ids);
            qb.push("))");
        }
    }
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
}

/// Bind a list of strings as `(?, ?, ...)`
pub fn push_str_list(qb: &mut QueryBuilder<'_, Sqlite>, values: &[String]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.clone());
    }
    separated.push_unseparated(")");
}

macro_rules! address_columns {
    () => {
        "ma.addr_id AS m_addr_id, ma.addr_line_1 AS m_line_1, ma.addr_line_2 AS m_line_2, \
         ma.addr_line_3 AS m_line_3, ma.city AS m_city, ma.province AS m_province, \
         ma.country_typ_cd AS m_country, ma.postal_cd AS m_postal, \
         ma.delivery_instructions AS m_instructions, \
         da.addr_id AS d_addr_id, da.addr_line_1 AS d_line_1, da.addr_line_2 AS d_line_2, \
         da.addr_line_3 AS d_line_3, da.city AS d_city, da.province AS d_province, \
         da.country_typ_cd AS d_country, da.postal_cd AS d_postal, \
         da.delivery_instructions AS d_instructions"
    };
}

/// Filing types whose event founds the corporation
pub const FOUNDING_FILING_TYPES: &str =
    "'ICORP', 'ICORU', 'ICORC', 'FRREG', 'AMALH', 'AMALV', 'AMALR', 'AMLHU', 'AMLVU', 'AMLRU'";

/// Legacy states marking a dissolution in progress
pub const OPEN_DISSOLUTION_STATES: &str = "'D1A', 'D1F', 'D2A', 'D2F'";

/// Header facts; founding date falls back to the founding event's timestamp
pub fn business_select() -> String {
    format!(
        r#"
        SELECT c.corp_num, c.corp_type_cd, cn.corp_nme AS corp_name,
               cs.state_type_cd, cs.op_state_type_cd,
               COALESCE(
                   c.recognition_dts,
                   (SELECT MIN(e.event_timestmp)
                      FROM event e
                      LEFT JOIN filing f ON f.event_id = e.event_id
                     WHERE e.corp_num = c.corp_num
                       AND (e.event_type_cd = 'CONVICORP' OR f.filing_type_cd IN ({})))
               ) AS founding_date,
               c.bn_9, c.bn_15, c.admin_email, c.last_ar_filed_dt
          FROM corporation c
          LEFT JOIN corp_name cn
            ON cn.corp_num = c.corp_num AND cn.corp_name_typ_cd IN ('CO', 'NB')"#,
        FOUNDING_FILING_TYPES
    )
}

pub const BUSINESS_STATE_JOIN: &str =
    " LEFT JOIN corp_state cs ON cs.corp_num = c.corp_num";

/// Event stream with filing columns, in processing order
pub const EVENTS_SELECT: &str = r#"
    SELECT e.event_id, e.event_type_cd, e.event_timestmp, e.trigger_dts,
           f.filing_type_cd, f.effective_dt, f.period_end_dt, f.court_order_num,
           f.arrangement_ind, f.corrected_event_id, f.withdrawn_event_id, f.nr_num
      FROM event e
      LEFT JOIN filing f ON f.event_id = e.event_id
     WHERE e.corp_num = ?
     ORDER BY e.event_timestmp ASC, e.event_id ASC
"#;

pub const OFFICES_SELECT: &str = concat!(
    "SELECT o.office_typ_cd, ",
    address_columns!(),
    " FROM office o \
       LEFT JOIN address ma ON ma.addr_id = o.mailing_addr_id \
       LEFT JOIN address da ON da.addr_id = o.delivery_addr_id \
      WHERE o.corp_num = "
);

pub const OFFICES_ORDER: &str = " ORDER BY o.office_typ_cd";

pub const PARTIES_SELECT: &str = concat!(
    "SELECT p.corp_party_id, p.party_typ_cd, p.first_nme, p.middle_nme, p.last_nme, \
            p.business_nme, p.bus_company_num, p.email_address, p.appointment_dt, \
            p.cessation_dt, ",
    address_columns!(),
    " FROM corp_party p \
       LEFT JOIN address ma ON ma.addr_id = p.mailing_addr_id \
       LEFT JOIN address da ON da.addr_id = p.delivery_addr_id \
      WHERE p.corp_num = "
);

pub const PARTIES_ORDER: &str = " ORDER BY p.party_typ_cd, p.corp_party_id";

pub const SHARE_CLASSES_SELECT: &str = r#"
    SELECT s.share_class_id, s.class_nme, s.currency_typ_cd, s.max_share_ind,
           s.share_quantity, s.spec_rights_ind, s.par_value_ind, s.par_value_amt, s.seq_num
      FROM share_struct_cls s
     WHERE s.corp_num = "#;

pub const SHARE_CLASSES_ORDER: &str = " ORDER BY s.seq_num, s.share_class_id";

pub const ALIASES_SELECT: &str = r#"
    SELECT a.corp_nme, a.corp_name_typ_cd
      FROM corp_name a
     WHERE a.corp_name_typ_cd = 'TR' AND a.corp_num = "#;

pub const ALIASES_ORDER: &str = " ORDER BY a.start_event_id, a.corp_nme";

pub const RESOLUTIONS_SELECT: &str = r#"
    SELECT r.resolution_dt, r.resolution_type_cd
      FROM resolution r
     WHERE r.corp_num = "#;

pub const RESOLUTIONS_ORDER: &str = " ORDER BY r.resolution_dt, r.start_event_id";

pub const DESCRIPTION_SELECT: &str = r#"
    SELECT bd.naics_code, bd.description
      FROM business_description bd
     WHERE bd.corp_num = "#;

pub const DESCRIPTION_ORDER: &str = " ORDER BY bd.start_event_id DESC LIMIT 1";

pub const AMALGAMATIONS_BY_EVENT: &str = r#"
    SELECT event_id, ted_corp_num, ting_corp_num, adopted_corp_ind
      FROM corp_involved_amalgamating
     WHERE event_id = ?
     ORDER BY corp_involve_id
"#;

pub const AMALGAMATIONS_BY_CORP: &str = r#"
    SELECT event_id, ted_corp_num, ting_corp_num, adopted_corp_ind
      FROM corp_involved_amalgamating
     WHERE ted_corp_num = ?
     ORDER BY event_id, corp_involve_id
"#;

/// Batch selection; corp type list, corp filter, reprocess flag and limit are appended
pub const UNPROCESSED_SELECT: &str = r#"
    SELECT c.corp_num, c.corp_type_cd, cn.corp_nme AS corp_name, cp.processed_status
      FROM corporation c
      LEFT JOIN corp_name cn
        ON cn.corp_num = c.corp_num
       AND cn.corp_name_typ_cd IN ('CO', 'NB')
       AND cn.end_event_id IS NULL
      LEFT JOIN corp_processing cp
        ON cp.corp_num = c.corp_num
       AND cp.flow_name = "#;
