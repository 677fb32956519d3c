//! Which templates a completion activates.
//!
//! This table is the runtime source of truth for activation. It is kept apart
//! from the catalog's prerequisite lists on purpose and the two differ:
//! network account provisioning lists the NDA as a prerequisite but only
//! initial training activates it, and DTS detach is activated by the transfer
//! memo although its listed prerequisite is the transfer confirmation.

use std::collections::HashSet;

use crate::model::ChecklistItem;
use crate::templates::TemplateId;

/// `(completed, activates)` pairs.
pub const CASCADES: &[(TemplateId, &[TemplateId])] = &[
    (
        TemplateId::InstallationInProcessing,
        &[TemplateId::ObtainGovernmentCredential],
    ),
    (
        TemplateId::SponsorshipInitiation,
        &[TemplateId::SponsorshipCoordination],
    ),
    (
        TemplateId::SponsorshipCoordination,
        &[TemplateId::ObtainContractorCredential],
    ),
    (
        TemplateId::ObtainGovernmentCredential,
        &[
            TemplateId::VerifyCredential,
            TemplateId::VerifyLearningAccount,
            TemplateId::VerifyTrainingAccount,
        ],
    ),
    (
        TemplateId::ObtainContractorCredential,
        &[TemplateId::VerifyCredential, TemplateId::VerifyLearningAccount],
    ),
    (
        TemplateId::CyberAwarenessTraining,
        &[TemplateId::ProvisionNetworkAccount],
    ),
    (
        TemplateId::ProvisionNetworkAccount,
        &[TemplateId::EquipmentIssue, TemplateId::AddSecurityGroups],
    ),
    (
        TemplateId::SecurityTraining,
        &[TemplateId::ConfirmSecurityTraining],
    ),
    (
        TemplateId::VerifyLearningAccount,
        &[
            TemplateId::ConfirmLearningAccount,
            TemplateId::MandatoryTraining,
        ],
    ),
    (
        TemplateId::MandatoryTraining,
        &[TemplateId::ConfirmMandatoryTraining],
    ),
    (
        TemplateId::VerifyTrainingAccount,
        &[TemplateId::ConfirmTrainingAccount],
    ),
    (TemplateId::TravelCoordination, &[TemplateId::GtcApplication]),
    (TemplateId::GtcApplication, &[TemplateId::DtsProfile]),
    (
        TemplateId::ScheduleEquipmentTurnIn,
        &[TemplateId::EquipmentTurnIn],
    ),
    (
        TemplateId::TravelTransferMemo,
        &[TemplateId::ConfirmTravelTransfer, TemplateId::DtsDetach],
    ),
    (
        TemplateId::CredentialTurnIn,
        &[TemplateId::ConfirmCredentialTurnIn],
    ),
];

/// Templates activated when an item of `completed` finishes. Empty for
/// templates that trigger nothing.
#[must_use]
pub fn targets(completed: TemplateId) -> &'static [TemplateId] {
    CASCADES
        .iter()
        .find(|(trigger, _)| *trigger == completed)
        .map_or(&[], |(_, activates)| activates)
}

/// Templates some completed item in `items` activates.
#[must_use]
pub fn triggered(items: &[ChecklistItem]) -> HashSet<TemplateId> {
    items
        .iter()
        .filter(|item| item.is_completed())
        .flat_map(|item| targets(item.template).iter().copied())
        .collect()
}
