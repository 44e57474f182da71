//! Filing JSON transformation
//!
//! Shapes each pending record into a LEAR filing document:
//!
//! ```text
//! { "filing": { "header": {..}, "business": {..}, "<filingName>": {..} } }
//! ```
//!
//! Section builders are selected by an exhaustive match on [`FilingKind`].

use serde_json::{json, Map, Value};

use super::classification::is_administrative_dissolution;
use crate::error::{EventFailure, MigrationError};
use crate::models::{
    Address, Cleaned, Disposition, EventFilingHeader, EventFilingRecord, EventTimes, FilingData,
    FilingKind, Office, Party, Transformed,
};

/// Source marker written into every migrated filing header
pub const FILING_SOURCE: &str = "COLIN";

/// Transform one business's records; only pending records get a document
pub fn transform_records(
    records: Vec<EventFilingRecord<Cleaned>>,
) -> Result<Vec<EventFilingRecord<Transformed>>, EventFailure> {
    records
        .into_iter()
        .map(|record| {
            let times = record.stage.times.clone();
            let filing_json = match record.header.disposition() {
                Disposition::Pending(kind) => {
                    let times = times.as_ref().ok_or_else(|| {
                        EventFailure::at(
                            &record.header,
                            MigrationError::MissingData("cleaned event dates".to_string()),
                        )
                    })?;
                    let document = build_filing_json(kind, &record.header, &record.data, times)
                        .map_err(|e| EventFailure::at(&record.header, e))?;
                    Some(document)
                }
                _ => None,
            };
            Ok(record.advance(Transformed { times, filing_json }))
        })
        .collect()
}

/// Full LEAR filing document for one event
pub fn build_filing_json(
    kind: FilingKind,
    header: &EventFilingHeader,
    data: &FilingData,
    times: &EventTimes,
) -> Result<Value, MigrationError> {
    let business = &data.business;
    let mut filing = Map::new();

    filing.insert(
        "header".to_string(),
        json!({
            "name": kind.lear_name(),
            "date": times.filing_date,
            "effectiveDate": times.effective_date,
            "source": FILING_SOURCE,
            "colinIds": [header.event_id],
        }),
    );
    filing.insert(
        "business".to_string(),
        json!({
            "identifier": business.identifier,
            "legalName": business.legal_name,
            "legalType": business.corp_type_cd,
            "foundingDate": times.founding_date,
        }),
    );
    filing.insert(kind.lear_name().to_string(), section(kind, header, data, times)?);

    Ok(json!({ "filing": Value::Object(filing) }))
}

fn section(
    kind: FilingKind,
    header: &EventFilingHeader,
    data: &FilingData,
    times: &EventTimes,
) -> Result<Value, MigrationError> {
    let business = &data.business;
    let event = &data.event;

    let value = match kind {
        FilingKind::IncorporationApplication | FilingKind::Conversion | FilingKind::Registration => {
            json!({
                "nameRequest": name_request(data),
                "offices": offices_json(&data.offices)?,
                "parties": parties_json(&data.parties)?,
                "shareStructure": share_structure_json(data),
                "courtOrder": court_order_json(data),
            })
        }
        FilingKind::AmalgamationApplication => {
            let amalgamating: Vec<Value> = data
                .amalgamations
                .iter()
                .map(|a| json!({ "identifier": a.identifier, "role": a.role }))
                .collect();
            json!({
                "type": amalgamation_type(header),
                "nameRequest": name_request(data),
                "amalgamatingBusinesses": amalgamating,
                "offices": offices_json(&data.offices)?,
                "parties": parties_json(&data.parties)?,
                "shareStructure": share_structure_json(data),
                "courtOrder": court_order_json(data),
            })
        }
        FilingKind::AnnualReport => {
            let ar_date = event
                .period_end_dt
                .map(colin_common::time::format_date)
                .unwrap_or_else(|| times.filing_date.clone());
            json!({
                "annualReportDate": ar_date,
                "annualGeneralMeetingDate": Value::Null,
                "directors": directors_json(&data.parties)?,
            })
        }
        FilingKind::ChangeOfAddress => json!({ "offices": offices_json(&data.offices)? }),
        FilingKind::ChangeOfDirectors => json!({ "directors": directors_json(&data.parties)? }),
        FilingKind::Alteration => json!({
            "business": { "legalType": business.corp_type_cd },
            "nameRequest": name_request(data),
            "shareStructure": share_structure_json(data),
            "courtOrder": court_order_json(data),
        }),
        FilingKind::ChangeOfRegistration => json!({
            "nameRequest": name_request(data),
            "offices": offices_json(&data.offices)?,
            "parties": parties_json(&data.parties)?,
            "business": {
                "naics": {
                    "naicsCode": business.naics_code,
                    "naicsDescription": business.naics_description,
                }
            },
        }),
        FilingKind::Correction => {
            let mapping = header.correction.ok_or_else(|| {
                MigrationError::MissingData(format!(
                    "correction target for event {}",
                    header.event_id
                ))
            })?;
            if mapping.target_filing_type == FilingKind::Correction {
                return Err(MigrationError::InvalidRequest(format!(
                    "event {} resolves to a correction of a correction",
                    header.event_id
                )));
            }
            let mut body = match section(mapping.target_filing_type, header, data, times)? {
                Value::Object(map) => map,
                other => {
                    let mut map = Map::new();
                    map.insert("details".to_string(), other);
                    map
                }
            };
            body.insert("correctedEventId".to_string(), json!(mapping.corrected_event_id));
            body.insert(
                "correctedFilingType".to_string(),
                json!(mapping.target_filing_type.lear_name()),
            );
            body.insert(
                "comment".to_string(),
                json!(format!(
                    "Correction for {} filed on {}",
                    mapping.target_filing_type.lear_name(),
                    times.filing_date
                )),
            );
            Value::Object(body)
        }
        FilingKind::Dissolution => {
            let dissolution_type = if is_administrative_dissolution(&header.event_file_type) {
                "administrative"
            } else {
                "voluntary"
            };
            json!({
                "dissolutionType": dissolution_type,
                "dissolutionDate": times.filing_date,
            })
        }
        FilingKind::Restoration => {
            let restoration_type = match header.event_file_type.parts().1 {
                Some("RESTL") => "limitedRestoration",
                Some("RESXL") => "limitedRestorationExtension",
                _ => "fullRestoration",
            };
            json!({
                "type": restoration_type,
                "legalName": business.legal_name,
                "offices": offices_json(&data.offices)?,
                "parties": parties_json(&data.parties)?,
            })
        }
        FilingKind::PutBackOn => json!({ "details": "Put back on by registrar" }),
        FilingKind::ContinuationOut => json!({
            "continuationOutDate": times.filing_date,
            "courtOrder": court_order_json(data),
        }),
    };
    Ok(value)
}

fn name_request(data: &FilingData) -> Value {
    json!({
        "legalName": data.business.legal_name,
        "legalType": data.business.corp_type_cd,
        "nrNumber": data.event.nr_num,
    })
}

fn court_order_json(data: &FilingData) -> Value {
    match data.event.court_order_num.as_deref() {
        Some(num) if !num.trim().is_empty() => {
            let effect = if data.event.is_arrangement() { "planOfArrangement" } else { "" };
            json!({ "fileNumber": num.trim(), "effectOfOrder": effect })
        }
        _ => Value::Null,
    }
}

fn amalgamation_type(header: &EventFilingHeader) -> &'static str {
    match header.event_file_type.parts().1 {
        Some("AMALH" | "AMLHU") => "horizontal",
        Some("AMALV" | "AMLVU") => "vertical",
        _ => "regular",
    }
}

/// LEAR office name for a legacy office type
pub fn lear_office_type(office_type_cd: &str) -> Result<&'static str, MigrationError> {
    match office_type_cd {
        "RG" => Ok("registeredOffice"),
        "RC" => Ok("recordsOffice"),
        "BC" => Ok("businessOffice"),
        other => Err(MigrationError::UnmappedValue {
            field: "office_type",
            value: other.to_string(),
        }),
    }
}

/// LEAR role name for a legacy party type
pub fn lear_role(party_type_cd: &str) -> Result<&'static str, MigrationError> {
    match party_type_cd {
        "DIR" => Ok("Director"),
        "OFF" => Ok("Officer"),
        "INC" => Ok("Incorporator"),
        "FBO" => Ok("Proprietor"),
        "FCP" => Ok("Partner"),
        "CPY" => Ok("Completing Party"),
        other => Err(MigrationError::UnmappedValue {
            field: "party_type",
            value: other.to_string(),
        }),
    }
}

pub fn address_json(address: &Option<Address>) -> Value {
    match address {
        None => Value::Null,
        Some(a) => json!({
            "streetAddress": a.street,
            "streetAddressAdditional": a.street_additional,
            "addressCity": a.city,
            "addressRegion": a.region,
            "postalCode": a.postal_code,
            "addressCountry": a.country,
            "deliveryInstructions": a.delivery_instructions,
        }),
    }
}

fn offices_json(offices: &[Office]) -> Result<Value, MigrationError> {
    let mut map = Map::new();
    for office in offices {
        map.insert(
            lear_office_type(&office.office_type_cd)?.to_string(),
            json!({
                "mailingAddress": address_json(&office.mailing),
                "deliveryAddress": address_json(&office.delivery),
            }),
        );
    }
    Ok(Value::Object(map))
}

fn party_json(party: &Party) -> Result<Value, MigrationError> {
    let party_type = if party.is_organization() { "organization" } else { "person" };
    Ok(json!({
        "officer": {
            "partyType": party_type,
            "firstName": party.first_name,
            "middleInitial": party.middle_name,
            "lastName": party.last_name,
            "organizationName": party.business_name,
            "identifier": party.identifier,
            "email": party.email,
        },
        "mailingAddress": address_json(&party.mailing),
        "deliveryAddress": address_json(&party.delivery),
        "roles": [{
            "roleType": lear_role(&party.party_type_cd)?,
            "appointmentDate": party.appointment_date.map(colin_common::time::format_date),
        }],
    }))
}

fn parties_json(parties: &[Party]) -> Result<Value, MigrationError> {
    parties
        .iter()
        .map(party_json)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn directors_json(parties: &[Party]) -> Result<Value, MigrationError> {
    parties
        .iter()
        .filter(|p| p.party_type_cd == "DIR")
        .map(party_json)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn share_structure_json(data: &FilingData) -> Value {
    let classes: Vec<Value> = data
        .share_classes
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "priority": c.priority,
                "hasMaximumShares": c.max_share_flag,
                "maxNumberOfShares": c.max_shares,
                "hasParValue": c.par_value_flag,
                "parValue": c.par_value,
                "currency": c.currency,
                "hasRightsOrRestrictions": c.special_rights_flag,
            })
        })
        .collect();
    let resolution_dates: Vec<Value> = data
        .resolutions
        .iter()
        .filter_map(|r| r.resolution_date.map(colin_common::time::format_date))
        .map(Value::String)
        .collect();
    json!({ "shareClasses": classes, "resolutionDates": resolution_dates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BusinessSnapshot, Classification, CorrectionMapping, EventFileType, SourceEvent,
    };
    use chrono::NaiveDate;

    fn header(filing_type: &str, kind: FilingKind) -> EventFilingHeader {
        EventFilingHeader::new(
            "BC0000001",
            3,
            EventFileType::new("FILE", Some(filing_type)),
            Classification::Supported(kind),
            false,
        )
    }

    fn data() -> FilingData {
        FilingData {
            event: SourceEvent {
                event_id: 3,
                event_type_cd: "FILE".to_string(),
                event_timestmp: NaiveDate::from_ymd_opt(2022, 3, 4).unwrap().and_hms_opt(10, 0, 0).unwrap(),
                trigger_dts: None,
                filing_type_cd: Some("CO_AD".to_string()),
                effective_dt: None,
                period_end_dt: None,
                court_order_num: None,
                arrangement_ind: None,
                corrected_event_id: Some(2),
                withdrawn_event_id: None,
                nr_num: None,
            },
            business: BusinessSnapshot {
                corp_num: "BC0000001".to_string(),
                identifier: "BC0000001".to_string(),
                corp_type_cd: "BC".to_string(),
                legal_name: Some("ACME LTD.".to_string()),
                op_state_type_cd: Some("ACT".to_string()),
                state_type_cd: Some("ACT".to_string()),
                founding_date: None,
                tax_id: None,
                admin_email: None,
                last_ar_date: None,
                naics_code: None,
                naics_description: None,
            },
            offices: vec![Office {
                office_type_cd: "RG".to_string(),
                mailing: Some(Address {
                    street: Some("1 MAIN ST".to_string()),
                    city: Some("VICTORIA".to_string()),
                    country: Some("CA".to_string()),
                    ..Default::default()
                }),
                delivery: None,
            }],
            parties: vec![],
            share_classes: vec![],
            aliases: vec![],
            resolutions: vec![],
            amalgamations: vec![],
        }
    }

    fn times() -> EventTimes {
        EventTimes {
            event_timestamp: "2022-03-04T18:00:00+00:00".to_string(),
            effective_date: "2022-03-04T18:00:00+00:00".to_string(),
            filing_date: "2022-03-04".to_string(),
            founding_date: None,
        }
    }

    #[test]
    fn test_document_envelope() {
        let doc = build_filing_json(
            FilingKind::ChangeOfAddress,
            &header("NOCAD", FilingKind::ChangeOfAddress),
            &data(),
            &times(),
        )
        .unwrap();

        let filing = &doc["filing"];
        assert_eq!(filing["header"]["name"], "changeOfAddress");
        assert_eq!(filing["header"]["source"], "COLIN");
        assert_eq!(filing["header"]["colinIds"], json!([3]));
        assert_eq!(filing["business"]["identifier"], "BC0000001");
        assert_eq!(
            filing["changeOfAddress"]["offices"]["registeredOffice"]["mailingAddress"]["streetAddress"],
            "1 MAIN ST"
        );
    }

    #[test]
    fn test_correction_carries_target() {
        let mut header = header("CO_AD", FilingKind::Correction);
        header.correction = Some(CorrectionMapping {
            corrected_event_id: 2,
            target_filing_type: FilingKind::ChangeOfAddress,
        });

        let doc = build_filing_json(FilingKind::Correction, &header, &data(), &times()).unwrap();
        let correction = &doc["filing"]["correction"];
        assert_eq!(correction["correctedEventId"], 2);
        assert_eq!(correction["correctedFilingType"], "changeOfAddress");
        assert!(correction["offices"]["registeredOffice"].is_object());
    }

    #[test]
    fn test_correction_without_target_fails() {
        let err = build_filing_json(
            FilingKind::Correction,
            &header("CO_AD", FilingKind::Correction),
            &data(),
            &times(),
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::MissingData(_)));
    }

    #[test]
    fn test_unmapped_codes() {
        assert!(lear_office_type("ZZ").is_err());
        assert_eq!(lear_role("FBO").unwrap(), "Proprietor");
        assert!(matches!(
            lear_role("XYZ"),
            Err(MigrationError::UnmappedValue { field: "party_type", .. })
        ));
    }

    #[test]
    fn test_only_pending_records_get_documents() {
        let pending = EventFilingRecord::new(header("NOCAD", FilingKind::ChangeOfAddress), data())
            .advance(Cleaned { times: Some(times()) });
        let mut in_lear_header = header("NOCAD", FilingKind::ChangeOfAddress);
        in_lear_header.is_in_lear = true;
        let in_lear = EventFilingRecord::new(in_lear_header, data()).advance(Cleaned { times: Some(times()) });

        let out = transform_records(vec![pending, in_lear]).unwrap();
        assert!(out[0].filing_json().is_some());
        assert!(out[1].filing_json().is_none());
    }
}
