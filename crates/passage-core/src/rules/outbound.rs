use super::exit_reason::{ExitCategory, ExitReason, is_in_category};
use super::{Selection, push_if};
use crate::model::{EmploymentType, Request};
use crate::templates::TemplateId;

const BASELINE: &[TemplateId] = &[
    TemplateId::ScheduleEquipmentTurnIn,
    TemplateId::EquipmentTurnIn,
];

/// Reasons that take the member out of the organization for good.
const LEAVING: &[ExitCategory] = &[ExitCategory::Retiring, ExitCategory::Separating];

/// Templates for an out-processing request, in checklist order.
///
/// Out-processing never overrides initial activation.
#[must_use]
pub fn select_outbound(request: &Request) -> Vec<Selection> {
    let employment = request.employment_type;
    let government = employment.is_government();
    let civilian = employment == EmploymentType::Civilian;
    let contractor = employment == EmploymentType::Contractor;
    let leaving = is_in_category(request.exit_reason, LEAVING);
    // Moving to another DoD component keeps the same credential.
    let keeps_credential = request.exit_reason == Some(ExitReason::MoveToNonAfDod);

    let mut out: Vec<Selection> = BASELINE.iter().copied().map(Selection::new).collect();

    push_if(&mut out, contractor, &[TemplateId::RemoveWhatTool]);
    push_if(&mut out, request.has_sipr, &[TemplateId::SiprTokenTurnIn]);
    push_if(
        &mut out,
        government && leaving,
        &[TemplateId::ClearanceTermination],
    );
    push_if(&mut out, request.has_sci, &[TemplateId::SpecialAccessRemoval]);
    push_if(
        &mut out,
        request.is_traveler,
        &[
            TemplateId::TravelTransferMemo,
            TemplateId::ConfirmTravelTransfer,
            TemplateId::DtsDetach,
        ],
    );
    push_if(&mut out, civilian && leaving, &[TemplateId::CloseAtaaps]);
    push_if(
        &mut out,
        (government && leaving && !keeps_credential) || contractor,
        &[TemplateId::CredentialTurnIn],
    );
    push_if(&mut out, contractor, &[TemplateId::ConfirmCredentialTurnIn]);

    out
}
