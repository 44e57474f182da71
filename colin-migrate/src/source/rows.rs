//! Raw rows returned by the COLIN queries

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{
    Address, Alias, AmalgamatingBusiness, Office, Party, Resolution, ShareClass,
};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BusinessRow {
    pub corp_num: String,
    pub corp_type_cd: String,
    pub corp_name: Option<String>,
    pub state_type_cd: Option<String>,
    pub op_state_type_cd: Option<String>,
    pub founding_date: Option<NaiveDateTime>,
    pub bn_9: Option<String>,
    pub bn_15: Option<String>,
    pub admin_email: Option<String>,
    pub last_ar_filed_dt: Option<NaiveDate>,
}

impl BusinessRow {
    /// Prefer the full program account number over the bare BN9
    pub fn tax_id(&self) -> Option<String> {
        self.bn_15.clone().or_else(|| self.bn_9.clone())
    }
}

/// Mailing (`m_`) and delivery (`d_`) address columns joined onto a row
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct AddressPair {
    pub m_addr_id: Option<i64>,
    pub m_line_1: Option<String>,
    pub m_line_2: Option<String>,
    pub m_line_3: Option<String>,
    pub m_city: Option<String>,
    pub m_province: Option<String>,
    pub m_country: Option<String>,
    pub m_postal: Option<String>,
    pub m_instructions: Option<String>,
    pub d_addr_id: Option<i64>,
    pub d_line_1: Option<String>,
    pub d_line_2: Option<String>,
    pub d_line_3: Option<String>,
    pub d_city: Option<String>,
    pub d_province: Option<String>,
    pub d_country: Option<String>,
    pub d_postal: Option<String>,
    pub d_instructions: Option<String>,
}

impl AddressPair {
    /// Absent relation (no joined row) yields `None`
    pub fn mailing(&self) -> Option<Address> {
        self.m_addr_id.map(|_| Address {
            street: self.m_line_1.clone(),
            street_additional: self.m_line_2.clone(),
            street_line_3: self.m_line_3.clone(),
            city: self.m_city.clone(),
            region: self.m_province.clone(),
            postal_code: self.m_postal.clone(),
            country: self.m_country.clone(),
            delivery_instructions: self.m_instructions.clone(),
        })
    }

    pub fn delivery(&self) -> Option<Address> {
        self.d_addr_id.map(|_| Address {
            street: self.d_line_1.clone(),
            street_additional: self.d_line_2.clone(),
            street_line_3: self.d_line_3.clone(),
            city: self.d_city.clone(),
            region: self.d_province.clone(),
            postal_code: self.d_postal.clone(),
            country: self.d_country.clone(),
            delivery_instructions: self.d_instructions.clone(),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OfficeRow {
    pub office_typ_cd: String,
    #[sqlx(flatten)]
    pub addresses: AddressPair,
}

impl From<OfficeRow> for Office {
    fn from(row: OfficeRow) -> Self {
        Office {
            office_type_cd: row.office_typ_cd.trim().to_string(),
            mailing: row.addresses.mailing(),
            delivery: row.addresses.delivery(),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PartyRow {
    pub corp_party_id: i64,
    pub party_typ_cd: String,
    pub first_nme: Option<String>,
    pub middle_nme: Option<String>,
    pub last_nme: Option<String>,
    pub business_nme: Option<String>,
    pub bus_company_num: Option<String>,
    pub email_address: Option<String>,
    pub appointment_dt: Option<NaiveDate>,
    pub cessation_dt: Option<NaiveDate>,
    #[sqlx(flatten)]
    pub addresses: AddressPair,
}

impl From<PartyRow> for Party {
    fn from(row: PartyRow) -> Self {
        Party {
            corp_party_id: row.corp_party_id,
            party_type_cd: row.party_typ_cd.trim().to_string(),
            first_name: row.first_nme.clone(),
            middle_name: row.middle_nme.clone(),
            last_name: row.last_nme.clone(),
            business_name: row.business_nme.clone().filter(|n| !n.trim().is_empty()),
            identifier: row.bus_company_num.clone(),
            email: row.email_address.clone(),
            appointment_date: row.appointment_dt,
            cessation_date: row.cessation_dt,
            mailing: row.addresses.mailing(),
            delivery: row.addresses.delivery(),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShareClassRow {
    pub share_class_id: i64,
    pub class_nme: String,
    pub currency_typ_cd: Option<String>,
    pub max_share_ind: Option<String>,
    pub share_quantity: Option<i64>,
    pub spec_rights_ind: Option<String>,
    pub par_value_ind: Option<String>,
    pub par_value_amt: Option<f64>,
    pub seq_num: Option<i64>,
}

fn flag(ind: &Option<String>) -> bool {
    matches!(ind.as_deref().map(str::trim), Some("Y") | Some("y"))
}

impl From<ShareClassRow> for ShareClass {
    fn from(row: ShareClassRow) -> Self {
        ShareClass {
            share_class_id: row.share_class_id,
            name: row.class_nme.clone(),
            priority: row.seq_num,
            currency: row.currency_typ_cd.clone(),
            max_share_flag: flag(&row.max_share_ind),
            max_shares: row.share_quantity,
            par_value_flag: flag(&row.par_value_ind),
            par_value: row.par_value_amt,
            special_rights_flag: flag(&row.spec_rights_ind),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AliasRow {
    pub corp_nme: String,
    pub corp_name_typ_cd: String,
}

impl From<AliasRow> for Alias {
    fn from(row: AliasRow) -> Self {
        Alias {
            name: row.corp_nme,
            alias_type: row.corp_name_typ_cd,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResolutionRow {
    pub resolution_dt: Option<NaiveDate>,
    pub resolution_type_cd: Option<String>,
}

impl From<ResolutionRow> for Resolution {
    fn from(row: ResolutionRow) -> Self {
        Resolution {
            resolution_date: row.resolution_dt,
            resolution_type: row.resolution_type_cd,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DescriptionRow {
    pub naics_code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AmalgamationRow {
    pub event_id: i64,
    pub ted_corp_num: String,
    pub ting_corp_num: String,
    pub adopted_corp_ind: Option<String>,
}

impl AmalgamationRow {
    pub fn to_amalgamating(&self, corp_type_cd: &str) -> AmalgamatingBusiness {
        let role = match self.adopted_corp_ind.as_deref().map(str::trim) {
            Some("Y") | Some("y") => "primary",
            Some("H") | Some("h") => "holding",
            _ => "amalgamating",
        };
        AmalgamatingBusiness {
            identifier: crate::models::event::lear_identifier(&self.ting_corp_num, corp_type_cd),
            role: role.to_string(),
        }
    }
}

/// Batch selection row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CandidateRow {
    pub corp_num: String,
    pub corp_type_cd: String,
    pub corp_name: Option<String>,
    pub processed_status: Option<String>,
}
