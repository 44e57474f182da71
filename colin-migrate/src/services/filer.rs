//! Filer: applies a saved filing's business-state side effects
//!
//! The loader saves the filing document, then hands the filing id and the
//! cleaned data to a [`Filer`]. The filer mutates the registry and returns
//! the business entity the next filing should see.

use async_trait::async_trait;
use colin_common::MigrationConfig;
use sqlx::SqliteConnection;
use std::collections::BTreeSet;
use tracing::debug;

use super::filing_json::{lear_office_type, lear_role};
use crate::db::lear::{self, AddressOwner, BusinessEntity, NewBusiness, NewParty};
use crate::error::{MigrationError, MigrationResult};
use crate::models::{EventFilingHeader, EventTimes, FilingData, FilingKind, Party};

/// Everything a filer is given for one filing
pub struct FilerContext<'a> {
    pub config: &'a MigrationConfig,
    pub filing_id: i64,
    /// Entity produced by the previous applied filing, if any
    pub business: Option<&'a BusinessEntity>,
    pub header: &'a EventFilingHeader,
    pub data: &'a FilingData,
    pub times: &'a EventTimes,
    pub kind: FilingKind,
}

/// Applies one filing inside the caller's transaction
///
/// Must fail rather than partially apply; the caller rolls back on error.
#[async_trait]
pub trait Filer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(
        &self,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
    ) -> MigrationResult<BusinessEntity>;
}

/// State change a filing kind makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Effect {
    CreateBusiness,
    UpdateName,
    UpdateLegalType,
    ReplaceOffices,
    ReplaceParties,
    ReplaceDirectors,
    ReplaceShareStructure,
    ReplaceAliases,
    AddResolutions,
    RecordAnnualReport,
    LinkAmalgamating,
    UpdateNaics,
    Dissolve,
    Restore,
    ContinueOut,
}

/// Effects of `kind` when filed on its own
pub fn effects(kind: FilingKind) -> &'static [Effect] {
    use Effect::*;

    match kind {
        FilingKind::IncorporationApplication | FilingKind::Conversion => &[
            CreateBusiness,
            ReplaceOffices,
            ReplaceParties,
            ReplaceShareStructure,
            ReplaceAliases,
            AddResolutions,
        ],
        FilingKind::Registration => &[CreateBusiness, ReplaceOffices, ReplaceParties, UpdateNaics],
        FilingKind::AmalgamationApplication => &[
            CreateBusiness,
            ReplaceOffices,
            ReplaceParties,
            ReplaceShareStructure,
            LinkAmalgamating,
        ],
        FilingKind::AnnualReport => &[RecordAnnualReport, ReplaceDirectors],
        FilingKind::ChangeOfAddress => &[ReplaceOffices],
        FilingKind::ChangeOfDirectors => &[ReplaceDirectors],
        FilingKind::Alteration => &[
            UpdateName,
            UpdateLegalType,
            ReplaceShareStructure,
            ReplaceAliases,
            AddResolutions,
        ],
        FilingKind::ChangeOfRegistration => &[UpdateName, ReplaceOffices, ReplaceParties, UpdateNaics],
        // Resolved against the corrected filing's kind
        FilingKind::Correction => &[],
        FilingKind::Dissolution => &[Dissolve],
        FilingKind::Restoration => &[Restore, UpdateName, ReplaceOffices, ReplaceParties],
        FilingKind::PutBackOn => &[Restore],
        FilingKind::ContinuationOut => &[ContinueOut],
    }
}

/// Effects of a correction of `target`
///
/// A correction restates the target's data; it creates the business only if
/// none exists yet.
pub fn correction_effects(target: FilingKind, business_exists: bool) -> BTreeSet<Effect> {
    let mut set: BTreeSet<Effect> = effects(target).iter().copied().collect();
    set.remove(&Effect::LinkAmalgamating);
    if business_exists {
        set.remove(&Effect::CreateBusiness);
    }
    set.insert(Effect::UpdateName);
    set
}

/// Roles replaced wholesale by a party-list filing
const REPLACEABLE_ROLES: &[&str] = &["Director", "Officer", "Proprietor", "Partner"];

/// Default filer writing to the LEAR registry tables
#[derive(Debug, Default, Clone)]
pub struct RegistryFiler;

impl RegistryFiler {
    pub fn new() -> Self {
        Self
    }

    async fn create_business(
        &self,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
    ) -> MigrationResult<i64> {
        let snapshot = &ctx.data.business;

        if let Some(existing) = lear::find_business_by_identifier(conn, &snapshot.identifier).await? {
            debug!(identifier = %existing.identifier, "Business already exists; updating");
            return Ok(existing.id);
        }

        let founding_date = ctx
            .times
            .founding_date
            .as_deref()
            .unwrap_or(&ctx.times.effective_date);
        lear::insert_business(
            conn,
            &NewBusiness {
                identifier: &snapshot.identifier,
                legal_name: snapshot.legal_name.as_deref(),
                legal_type: &snapshot.corp_type_cd,
                founding_date: Some(founding_date),
                tax_id: snapshot.tax_id.as_deref(),
                admin_email: snapshot.admin_email.as_deref(),
            },
        )
        .await
    }

    async fn replace_offices(
        &self,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
        business_id: i64,
    ) -> MigrationResult<()> {
        for office in &ctx.data.offices {
            let office_type = lear_office_type(&office.office_type_cd)?;
            lear::deactivate_offices(conn, business_id, office_type, &ctx.times.effective_date).await?;
            let office_id = lear::insert_office(conn, business_id, office_type).await?;

            if let Some(mailing) = &office.mailing {
                lear::insert_address(conn, AddressOwner::Office(office_id), "mailing", mailing).await?;
            }
            if let Some(delivery) = &office.delivery {
                lear::insert_address(conn, AddressOwner::Office(office_id), "delivery", delivery)
                    .await?;
            }
        }
        Ok(())
    }

    async fn replace_parties(
        &self,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
        business_id: i64,
        directors_only: bool,
    ) -> MigrationResult<()> {
        let ceased: &[&str] = if directors_only { &["Director"] } else { REPLACEABLE_ROLES };
        lear::cease_party_roles(conn, business_id, ceased, &ctx.times.effective_date).await?;

        let active = ctx.data.parties.iter().filter(|p| {
            p.cessation_date.is_none() && (!directors_only || p.party_type_cd == "DIR")
        });
        for party in active {
            self.insert_party(ctx, conn, business_id, party).await?;
        }
        Ok(())
    }

    async fn insert_party(
        &self,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
        business_id: i64,
        party: &Party,
    ) -> MigrationResult<()> {
        let role = lear_role(&party.party_type_cd)?;
        let party_type = if party.is_organization() { "organization" } else { "person" };
        let party_id = lear::insert_party(
            conn,
            &NewParty {
                party_type,
                first_name: party.first_name.as_deref(),
                middle_initial: party.middle_name.as_deref(),
                last_name: party.last_name.as_deref(),
                organization_name: party.business_name.as_deref(),
                identifier: party.identifier.as_deref(),
                email: party.email.as_deref(),
            },
        )
        .await?;

        if let Some(mailing) = &party.mailing {
            lear::insert_address(conn, AddressOwner::Party(party_id), "mailing", mailing).await?;
        }
        if let Some(delivery) = &party.delivery {
            lear::insert_address(conn, AddressOwner::Party(party_id), "delivery", delivery).await?;
        }

        lear::insert_party_role(
            conn,
            business_id,
            party_id,
            role,
            party.appointment_date,
            ctx.filing_id,
        )
        .await
    }

    async fn link_amalgamating(
        &self,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
        business_id: i64,
    ) -> MigrationResult<()> {
        for amalgamating in &ctx.data.amalgamations {
            lear::insert_amalgamating_business(
                conn,
                ctx.filing_id,
                business_id,
                &amalgamating.identifier,
                &amalgamating.role,
            )
            .await?;

            if let Some(ting) =
                lear::find_business_by_identifier(conn, &amalgamating.identifier).await?
            {
                if ting.id != business_id {
                    lear::update_state(conn, ting.id, "HISTORICAL", Some(ctx.times.effective_date.as_str()))
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn apply_effect(
        &self,
        effect: Effect,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
        business_id: i64,
    ) -> MigrationResult<()> {
        let snapshot = &ctx.data.business;
        match effect {
            // Handled before any other effect
            Effect::CreateBusiness => Ok(()),
            Effect::UpdateName => match snapshot.legal_name.as_deref() {
                Some(name) => lear::update_legal_name(conn, business_id, name).await,
                None => Ok(()),
            },
            Effect::UpdateLegalType => {
                lear::update_legal_type(conn, business_id, &snapshot.corp_type_cd).await
            }
            Effect::ReplaceOffices => self.replace_offices(ctx, conn, business_id).await,
            Effect::ReplaceParties => self.replace_parties(ctx, conn, business_id, false).await,
            Effect::ReplaceDirectors => self.replace_parties(ctx, conn, business_id, true).await,
            Effect::ReplaceShareStructure => {
                lear::replace_share_classes(conn, business_id, &ctx.data.share_classes).await
            }
            Effect::ReplaceAliases => {
                let aliases: Vec<(String, String)> = ctx
                    .data
                    .aliases
                    .iter()
                    .map(|a| (a.name.clone(), a.alias_type.clone()))
                    .collect();
                lear::replace_aliases(conn, business_id, &aliases).await
            }
            Effect::AddResolutions => {
                let resolutions: Vec<(Option<String>, Option<String>)> = ctx
                    .data
                    .resolutions
                    .iter()
                    .map(|r| {
                        (
                            r.resolution_date.map(colin_common::time::format_date),
                            r.resolution_type.clone(),
                        )
                    })
                    .collect();
                lear::add_resolutions(conn, business_id, &resolutions).await
            }
            Effect::RecordAnnualReport => {
                let ar_date = ctx
                    .data
                    .event
                    .period_end_dt
                    .map(colin_common::time::format_date)
                    .unwrap_or_else(|| ctx.times.filing_date.clone());
                lear::update_last_ar_date(conn, business_id, &ar_date).await
            }
            Effect::LinkAmalgamating => self.link_amalgamating(ctx, conn, business_id).await,
            Effect::UpdateNaics => {
                lear::update_naics(
                    conn,
                    business_id,
                    snapshot.naics_code.as_deref(),
                    snapshot.naics_description.as_deref(),
                )
                .await
            }
            Effect::Dissolve | Effect::ContinueOut => {
                lear::update_state(conn, business_id, "HISTORICAL", Some(ctx.times.effective_date.as_str()))
                    .await
            }
            Effect::Restore => lear::update_state(conn, business_id, "ACTIVE", None).await,
        }
    }
}

#[async_trait]
impl Filer for RegistryFiler {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn apply(
        &self,
        ctx: &FilerContext<'_>,
        conn: &mut SqliteConnection,
    ) -> MigrationResult<BusinessEntity> {
        let plan: BTreeSet<Effect> = match (ctx.kind, ctx.header.correction) {
            (FilingKind::Correction, Some(mapping)) => {
                correction_effects(mapping.target_filing_type, ctx.business.is_some())
            }
            (FilingKind::Correction, None) => {
                return Err(MigrationError::MissingData(format!(
                    "correction target for event {}",
                    ctx.header.event_id
                )))
            }
            (kind, _) => effects(kind).iter().copied().collect(),
        };

        let business_id = if plan.contains(&Effect::CreateBusiness) {
            self.create_business(ctx, conn).await?
        } else {
            ctx.business
                .map(|b| b.id)
                .ok_or_else(|| MigrationError::BusinessNotFound(ctx.data.business.identifier.clone()))?
        };

        for effect in &plan {
            self.apply_effect(*effect, ctx, conn, business_id).await?;
        }

        // Business numbers are assigned after incorporation
        if let (Some(existing), Some(tax_id)) = (ctx.business, ctx.data.business.tax_id.as_deref()) {
            if existing.tax_id.as_deref() != Some(tax_id) {
                lear::update_tax_id(conn, business_id, tax_id).await?;
            }
        }

        debug!(
            event_id = ctx.header.event_id,
            kind = %ctx.kind,
            effects = plan.len(),
            business_id,
            "Filing applied"
        );

        lear::find_business_by_id(conn, business_id).await?.ok_or_else(|| {
            MigrationError::InvalidRequest(format!("business {} vanished mid-filing", business_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_creating_kind_creates() {
        for kind in [
            FilingKind::IncorporationApplication,
            FilingKind::Conversion,
            FilingKind::Registration,
            FilingKind::AmalgamationApplication,
        ] {
            assert!(kind.creates_business());
            assert!(effects(kind).contains(&Effect::CreateBusiness), "{}", kind);
        }
        assert!(!effects(FilingKind::ChangeOfAddress).contains(&Effect::CreateBusiness));
    }

    #[test]
    fn test_correction_effects() {
        let on_existing = correction_effects(FilingKind::AmalgamationApplication, true);
        assert!(!on_existing.contains(&Effect::CreateBusiness));
        assert!(!on_existing.contains(&Effect::LinkAmalgamating));
        assert!(on_existing.contains(&Effect::UpdateName));

        let without_business = correction_effects(FilingKind::IncorporationApplication, false);
        assert!(without_business.contains(&Effect::CreateBusiness));

        let address = correction_effects(FilingKind::ChangeOfAddress, true);
        assert_eq!(
            address.into_iter().collect::<Vec<_>>(),
            vec![Effect::UpdateName, Effect::ReplaceOffices]
        );
    }
}
