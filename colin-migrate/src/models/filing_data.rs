//! Business state reconstructed as of one event

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::event::SourceEvent;

/// Everything the later stages need to migrate one event's filing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingData {
    pub event: SourceEvent,
    pub business: BusinessSnapshot,
    pub offices: Vec<Office>,
    pub parties: Vec<Party>,
    pub share_classes: Vec<ShareClass>,
    pub aliases: Vec<Alias>,
    pub resolutions: Vec<Resolution>,
    pub amalgamations: Vec<AmalgamatingBusiness>,
}

impl FilingData {
    /// Fill fields this event's snapshot left empty from the previous event's
    ///
    /// The legacy store only opens a name or description row when it changes,
    /// so early events (and events between a close and a reopen) can lack one.
    pub fn carry_forward(&mut self, previous: Option<&FilingData>) {
        let Some(previous) = previous else {
            return;
        };
        let prev = &previous.business;
        let business = &mut self.business;

        if business.legal_name.is_none() {
            business.legal_name = prev.legal_name.clone();
        }
        if business.founding_date.is_none() {
            business.founding_date = prev.founding_date;
        }
        if business.naics_code.is_none() && business.naics_description.is_none() {
            business.naics_code = prev.naics_code.clone();
            business.naics_description = prev.naics_description.clone();
        }
        if business.tax_id.is_none() {
            business.tax_id = prev.tax_id.clone();
        }
    }
}

/// Corporation header facts as of the event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessSnapshot {
    pub corp_num: String,
    pub identifier: String,
    pub corp_type_cd: String,
    pub legal_name: Option<String>,
    /// `ACT` or `HIS`
    pub op_state_type_cd: Option<String>,
    pub state_type_cd: Option<String>,
    pub founding_date: Option<NaiveDateTime>,
    pub tax_id: Option<String>,
    pub admin_email: Option<String>,
    pub last_ar_date: Option<NaiveDate>,
    pub naics_code: Option<String>,
    pub naics_description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    pub street: Option<String>,
    pub street_additional: Option<String>,
    pub street_line_3: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub delivery_instructions: Option<String>,
}

impl Address {
    pub fn is_blank(&self) -> bool {
        [
            &self.street,
            &self.street_additional,
            &self.street_line_3,
            &self.city,
            &self.region,
            &self.postal_code,
            &self.country,
            &self.delivery_instructions,
        ]
        .iter()
        .all(|v| v.as_deref().map(str::trim).unwrap_or("").is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Office {
    /// Legacy office type (`RG`, `RC`, `BC`)
    pub office_type_cd: String,
    pub mailing: Option<Address>,
    pub delivery: Option<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Party {
    pub corp_party_id: i64,
    /// Legacy role (`DIR`, `OFF`, `INC`, `FBO`, `FCP`, `CPY`)
    pub party_type_cd: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub business_name: Option<String>,
    pub identifier: Option<String>,
    pub email: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub cessation_date: Option<NaiveDate>,
    pub mailing: Option<Address>,
    pub delivery: Option<Address>,
}

impl Party {
    pub fn is_organization(&self) -> bool {
        self.business_name.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareClass {
    pub share_class_id: i64,
    pub name: String,
    pub priority: Option<i64>,
    pub currency: Option<String>,
    pub max_share_flag: bool,
    pub max_shares: Option<i64>,
    pub par_value_flag: bool,
    pub par_value: Option<f64>,
    pub special_rights_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub name: String,
    pub alias_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub resolution_date: Option<NaiveDate>,
    pub resolution_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmalgamatingBusiness {
    pub identifier: String,
    /// `amalgamating`, `primary` or `holding`
    pub role: String,
}
