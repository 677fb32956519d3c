//! Static catalog of checklist task templates.
//!
//! # Overview
//!
//! A [`Template`] describes one kind of checklist task: its title, the lead
//! [`Role`] responsible for it, a description shown to that lead, and the
//! prerequisite templates that must normally finish first. The catalog is
//! closed: [`TemplateId`] enumerates every template, and the table itself is
//! embedded data (`catalog.toml`) versioned with the crate.
//!
//! Prerequisites here are descriptive metadata. They decide the *initial*
//! `active` flag of a freshly created item (active iff no prerequisites) and
//! are shown to humans. Runtime activation on completion is driven by the
//! separate table in [`crate::activation::cascade`].
//!
//! # Usage
//!
//! ```rust
//! use passage_core::templates::{Registry, TemplateId};
//!
//! let registry = Registry::builtin();
//! let template = registry.get(TemplateId::ObtainGovernmentCredential);
//! assert!(template.prerequisites.contains(&TemplateId::InstallationInProcessing));
//! ```

pub mod registry;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::{fmt, str::FromStr};

use crate::model::{ParseEnumError, RequestType, Role, normalize};

pub use registry::{CatalogError, Registry};

macro_rules! template_ids {
    ($($variant:ident => $key:literal),+ $(,)?) => {
        /// Identifier of a checklist template. Closed set.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum TemplateId {
            $(
                #[serde(rename = $key)]
                $variant,
            )+
        }

        impl TemplateId {
            /// Every template id, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Stable snake_case key used in the catalog and in storage.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $key,)+
                }
            }
        }

        impl FromStr for TemplateId {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match normalize(s).as_str() {
                    $($key => Ok(Self::$variant),)+
                    _ => Err(ParseEnumError {
                        expected: "template id",
                        got: s.to_string(),
                    }),
                }
            }
        }
    };
}

template_ids! {
    // In-processing
    WelcomePackage => "welcome_package",
    CyberAwarenessTraining => "cyber_awareness_training",
    VerifyCredential => "verify_credential",
    BuildingAccess => "building_access",
    ProvisionNetworkAccount => "provision_network_account",
    EquipmentIssue => "equipment_issue",
    AddSecurityGroups => "add_security_groups",
    SecurityTraining => "security_training",
    ConfirmSecurityTraining => "confirm_security_training",
    VerifyLearningAccount => "verify_learning_account",
    ConfirmLearningAccount => "confirm_learning_account",
    MandatoryTraining => "mandatory_training",
    ConfirmMandatoryTraining => "confirm_mandatory_training",
    PhoneSetup => "phone_setup",
    OrientationVideos => "orientation_videos",
    Bookmarks => "bookmarks",
    NewcomerBrief => "newcomer_brief",
    UnitOrientation => "unit_orientation",
    TeleworkStatus => "telework_status",
    SecurityRequirements => "security_requirements",
    SciBilletNomination => "sci_billet_nomination",
    InstallationInProcessing => "installation_in_processing",
    SponsorshipInitiation => "sponsorship_initiation",
    SponsorshipCoordination => "sponsorship_coordination",
    ObtainGovernmentCredential => "obtain_government_credential",
    ObtainContractorCredential => "obtain_contractor_credential",
    SignNda => "sign_nda",
    VerifyTrainingAccount => "verify_training_account",
    ConfirmTrainingAccount => "confirm_training_account",
    SupervisorTraining => "supervisor_training",
    Create971Folder => "create_971_folder",
    PerformancePlan => "performance_plan",
    TeleworkAgreement => "telework_agreement",
    AtaapsAccount => "ataaps_account",
    VerifyDirectDeposit => "verify_direct_deposit",
    VerifyTaxStatus => "verify_tax_status",
    TravelCoordination => "travel_coordination",
    GtcApplication => "gtc_application",
    DtsProfile => "dts_profile",
    // Out-processing
    ScheduleEquipmentTurnIn => "schedule_equipment_turn_in",
    EquipmentTurnIn => "equipment_turn_in",
    RemoveWhatTool => "remove_what_tool",
    SiprTokenTurnIn => "sipr_token_turn_in",
    ClearanceTermination => "clearance_termination",
    SpecialAccessRemoval => "special_access_removal",
    TravelTransferMemo => "travel_transfer_memo",
    ConfirmTravelTransfer => "confirm_travel_transfer",
    DtsDetach => "dts_detach",
    CloseAtaaps => "close_ataaps",
    CredentialTurnIn => "credential_turn_in",
    ConfirmCredentialTurnIn => "confirm_credential_turn_in",
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable definition of one checklist task type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub request_type: RequestType,
    pub title: String,
    pub lead: Role,
    pub description: String,
    #[serde(default)]
    pub prerequisites: BTreeSet<TemplateId>,
}

impl Template {
    /// Generic initial activation: actionable immediately iff nothing gates it.
    #[must_use]
    pub fn starts_active(&self) -> bool {
        self.prerequisites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::TemplateId;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn keys_are_unique_and_roundtrip() {
        let mut seen = HashSet::new();
        for id in TemplateId::ALL {
            assert!(seen.insert(id.as_str()), "duplicate key {id}");
            assert_eq!(TemplateId::from_str(id.as_str()).unwrap(), *id);
        }
    }

    #[test]
    fn serde_uses_catalog_keys() {
        assert_eq!(
            serde_json::to_string(&TemplateId::Create971Folder).unwrap(),
            "\"create_971_folder\""
        );
        assert_eq!(
            serde_json::from_str::<TemplateId>("\"sign_nda\"").unwrap(),
            TemplateId::SignNda
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(TemplateId::from_str("issue_parking_pass").is_err());
    }
}
