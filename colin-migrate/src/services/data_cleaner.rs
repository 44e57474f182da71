//! Data cleaning
//!
//! Normalizes the reconstructed data of every supported, non-skipped record,
//! in a fixed order: event dates, corp fields, parties, offices and addresses,
//! then NAICS (firms only). Classification and skip state are never touched.

use colin_common::time::{legacy_date, legacy_to_utc_string};
use colin_common::{FlowKind, MigrationConfig};
use tracing::warn;

use crate::error::{EventFailure, MigrationError};
use crate::models::{
    Address, BusinessSnapshot, Cleaned, EventFilingRecord, EventTimes, FilingData, Office, Party,
    Reconstructed,
};

const DEFAULT_COUNTRY: &str = "CA";

/// Clean one business's records, preserving order
pub fn clean_records(
    records: Vec<EventFilingRecord<Reconstructed>>,
    config: &MigrationConfig,
) -> Result<Vec<EventFilingRecord<Cleaned>>, EventFailure> {
    records
        .into_iter()
        .map(|record| {
            if !record.header.is_supported_type() || record.header.skip_filing() {
                return Ok(record.advance(Cleaned { times: None }));
            }

            let mut record = record;
            let times = clean_filing_data(&mut record.data, config)
                .map_err(|e| EventFailure::at(&record.header, e))?;
            Ok(record.advance(Cleaned { times: Some(times) }))
        })
        .collect()
}

/// Normalize `data` in place and resolve the event's LEAR dates
pub fn clean_filing_data(
    data: &mut FilingData,
    config: &MigrationConfig,
) -> Result<EventTimes, MigrationError> {
    let times = event_times(data);
    clean_business(&mut data.business, config);
    for party in &mut data.parties {
        clean_party(party)?;
    }
    for office in &mut data.offices {
        clean_office(office);
    }
    if config.flow == FlowKind::Firms {
        clean_naics(&mut data.business);
    }
    Ok(times)
}

fn event_times(data: &FilingData) -> EventTimes {
    let event = &data.event;
    let effective = event
        .effective_dt
        .or(event.trigger_dts)
        .unwrap_or(event.event_timestmp);

    EventTimes {
        event_timestamp: legacy_to_utc_string(event.event_timestmp),
        effective_date: legacy_to_utc_string(effective),
        filing_date: legacy_date(event.event_timestmp),
        founding_date: data.business.founding_date.map(legacy_to_utc_string),
    }
}

fn clean_business(business: &mut BusinessSnapshot, config: &MigrationConfig) {
    business.legal_name = business.legal_name.as_deref().and_then(collapse_whitespace);

    if let (Some(name), Some(suffix)) = (business.legal_name.as_mut(), &config.corp_name_suffix) {
        if !name.ends_with(suffix.as_str()) {
            name.push(' ');
            name.push_str(suffix);
        }
    }

    business.tax_id = match business.tax_id.as_deref() {
        None => None,
        Some(raw) => {
            let normalized = normalize_tax_id(raw);
            if normalized.is_none() && !raw.trim().is_empty() {
                warn!(corp_num = %business.corp_num, tax_id = raw, "Dropping malformed business number");
            }
            normalized
        }
    };

    business.admin_email = business
        .admin_email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string);
}

/// `123456789` or `123456789BC0001`, whitespace removed, letters uppercased
pub fn normalize_tax_id(raw: &str) -> Option<String> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let bytes = compact.as_bytes();

    let valid = match bytes.len() {
        9 => bytes.iter().all(u8::is_ascii_digit),
        15 => {
            bytes[..9].iter().all(u8::is_ascii_digit)
                && bytes[9..11].iter().all(u8::is_ascii_uppercase)
                && bytes[11..].iter().all(u8::is_ascii_digit)
        }
        _ => false,
    };
    valid.then_some(compact)
}

fn clean_party(party: &mut Party) -> Result<(), MigrationError> {
    party.first_name = party.first_name.as_deref().and_then(person_name);
    party.middle_name = party.middle_name.as_deref().and_then(person_name);
    party.last_name = party.last_name.as_deref().and_then(person_name);
    party.business_name = party.business_name.as_deref().and_then(collapse_whitespace);

    if party.last_name.is_none() && party.first_name.is_none() && party.business_name.is_none() {
        return Err(MigrationError::MissingData(format!(
            "name for party {} ({})",
            party.corp_party_id, party.party_type_cd
        )));
    }

    party.identifier = party
        .identifier
        .as_deref()
        .map(|id| {
            id.chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_uppercase()
        })
        .filter(|id| !id.is_empty());

    party.email = party
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string);

    party.mailing = party.mailing.take().and_then(clean_address);
    party.delivery = party.delivery.take().and_then(clean_address);
    Ok(())
}

fn clean_office(office: &mut Office) {
    office.office_type_cd = office.office_type_cd.trim().to_ascii_uppercase();
    office.mailing = office.mailing.take().and_then(clean_address);
    office.delivery = office.delivery.take().and_then(clean_address);
}

/// Blank address → `None`; lines 2 and 3 fold into `street_additional`
pub fn clean_address(address: Address) -> Option<Address> {
    if address.is_blank() {
        return None;
    }

    let additional: Vec<String> = [&address.street_additional, &address.street_line_3]
        .into_iter()
        .filter_map(|line| line.as_deref().and_then(collapse_whitespace))
        .collect();

    Some(Address {
        street: address.street.as_deref().and_then(collapse_whitespace),
        street_additional: (!additional.is_empty()).then(|| additional.join(" ")),
        street_line_3: None,
        city: address.city.as_deref().and_then(collapse_whitespace),
        region: address
            .region
            .as_deref()
            .and_then(collapse_whitespace)
            .map(|r| r.to_ascii_uppercase()),
        postal_code: address
            .postal_code
            .as_deref()
            .and_then(collapse_whitespace)
            .map(|p| p.to_ascii_uppercase()),
        country: Some(
            address
                .country
                .as_deref()
                .and_then(collapse_whitespace)
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
        ),
        delivery_instructions: address
            .delivery_instructions
            .as_deref()
            .and_then(collapse_whitespace),
    })
}

fn clean_naics(business: &mut BusinessSnapshot) {
    if let Some(code) = business.naics_code.as_deref() {
        let code = code.trim();
        if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
            business.naics_code = Some(code.to_string());
        } else {
            warn!(corp_num = %business.corp_num, naics_code = code, "Dropping malformed NAICS code");
            business.naics_code = None;
        }
    }
    business.naics_description = business
        .naics_description
        .as_deref()
        .and_then(collapse_whitespace);
}

fn collapse_whitespace(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

fn person_name(value: &str) -> Option<String> {
    collapse_whitespace(value).map(|n| n.to_uppercase())
}
