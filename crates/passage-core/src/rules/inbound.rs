use super::{Selection, push_if};
use crate::model::{EmploymentType, Request};
use crate::templates::TemplateId;

/// Tasks every in-processing checklist carries.
const BASELINE: &[TemplateId] = &[
    TemplateId::WelcomePackage,
    TemplateId::CyberAwarenessTraining,
    TemplateId::VerifyCredential,
    TemplateId::BuildingAccess,
    TemplateId::ProvisionNetworkAccount,
    TemplateId::EquipmentIssue,
    TemplateId::AddSecurityGroups,
    TemplateId::SecurityTraining,
    TemplateId::ConfirmSecurityTraining,
    TemplateId::VerifyLearningAccount,
    TemplateId::ConfirmLearningAccount,
    TemplateId::MandatoryTraining,
    TemplateId::ConfirmMandatoryTraining,
    TemplateId::PhoneSetup,
    TemplateId::OrientationVideos,
    TemplateId::Bookmarks,
    TemplateId::NewcomerBrief,
    TemplateId::UnitOrientation,
    TemplateId::TeleworkStatus,
    TemplateId::SecurityRequirements,
];

/// Position sensitivity and access codes that require an SCI billet for a
/// civilian.
const SCI_ACCESS_CODE: u8 = 5;
const SCI_SENSITIVITY_CODE: u8 = 4;

fn needs_sci_billet(request: &Request) -> bool {
    match request.employment_type {
        EmploymentType::Civilian => {
            request.access_code == Some(SCI_ACCESS_CODE)
                && request.sensitivity_code == Some(SCI_SENSITIVITY_CODE)
        }
        EmploymentType::Military => request.has_sci,
        EmploymentType::Contractor => false,
    }
}

/// Templates for an in-processing request, in checklist order.
#[must_use]
pub fn select_inbound(request: &Request) -> Vec<Selection> {
    let employment = request.employment_type;
    let government = employment.is_government();
    let civilian = employment == EmploymentType::Civilian;
    let contractor = employment == EmploymentType::Contractor;

    let mut out: Vec<Selection> = BASELINE.iter().copied().map(Selection::new).collect();

    push_if(&mut out, needs_sci_billet(request), &[TemplateId::SciBilletNomination]);
    push_if(
        &mut out,
        request.is_new_to_org,
        &[TemplateId::InstallationInProcessing],
    );
    push_if(
        &mut out,
        contractor,
        &[
            TemplateId::SponsorshipInitiation,
            TemplateId::SponsorshipCoordination,
            TemplateId::ObtainContractorCredential,
        ],
    );

    if government {
        // Already on the installation: nothing left to wait for.
        out.push(if request.is_new_to_org {
            Selection::new(TemplateId::ObtainGovernmentCredential)
        } else {
            Selection::active(TemplateId::ObtainGovernmentCredential)
        });
    }

    push_if(
        &mut out,
        government,
        &[
            TemplateId::SignNda,
            TemplateId::VerifyTrainingAccount,
            TemplateId::ConfirmTrainingAccount,
        ],
    );
    push_if(&mut out, request.is_supervisor, &[TemplateId::SupervisorTraining]);
    push_if(
        &mut out,
        civilian,
        &[TemplateId::Create971Folder, TemplateId::PerformancePlan],
    );
    push_if(&mut out, government, &[TemplateId::TeleworkAgreement]);
    push_if(
        &mut out,
        civilian,
        &[
            TemplateId::AtaapsAccount,
            TemplateId::VerifyDirectDeposit,
            TemplateId::VerifyTaxStatus,
        ],
    );
    push_if(
        &mut out,
        government && request.is_traveler,
        &[
            TemplateId::TravelCoordination,
            TemplateId::GtcApplication,
            TemplateId::DtsProfile,
        ],
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RequestType;
    use crate::rules::test_support::request;

    fn templates(selections: &[Selection]) -> Vec<TemplateId> {
        selections.iter().map(|s| s.template).collect()
    }

    fn has(selections: &[Selection], id: TemplateId) -> bool {
        selections.iter().any(|s| s.template == id)
    }

    #[test]
    fn contractor_gets_sponsorship_and_contractor_credential_only() {
        let selections = select_inbound(&request(RequestType::In, EmploymentType::Contractor));
        assert!(has(&selections, TemplateId::SponsorshipInitiation));
        assert!(has(&selections, TemplateId::SponsorshipCoordination));
        assert!(has(&selections, TemplateId::ObtainContractorCredential));
        assert!(!has(&selections, TemplateId::ObtainGovernmentCredential));
        assert!(!has(&selections, TemplateId::SignNda));
        assert!(!has(&selections, TemplateId::TeleworkAgreement));
        assert!(selections.iter().all(|s| s.override_active.is_none()));
    }

    #[test]
    fn civilian_not_new_gets_active_government_credential() {
        let selections = select_inbound(&request(RequestType::In, EmploymentType::Civilian));
        let credential = selections
            .iter()
            .find(|s| s.template == TemplateId::ObtainGovernmentCredential)
            .expect("government credential selected");
        assert_eq!(credential.override_active, Some(true));
        assert!(!has(&selections, TemplateId::InstallationInProcessing));
        assert!(!has(&selections, TemplateId::ObtainContractorCredential));
    }

    #[test]
    fn new_to_org_gets_installation_and_no_override() {
        let mut req = request(RequestType::In, EmploymentType::Military);
        req.is_new_to_org = true;
        let selections = select_inbound(&req);
        assert!(has(&selections, TemplateId::InstallationInProcessing));
        assert!(selections.iter().all(|s| s.override_active.is_none()));
    }

    #[test]
    fn sci_billet_rules_differ_by_employment_type() {
        let mut civilian = request(RequestType::In, EmploymentType::Civilian);
        civilian.has_sci = true;
        assert!(!has(&select_inbound(&civilian), TemplateId::SciBilletNomination));
        civilian.access_code = Some(5);
        civilian.sensitivity_code = Some(4);
        assert!(has(&select_inbound(&civilian), TemplateId::SciBilletNomination));
        civilian.sensitivity_code = Some(3);
        assert!(!has(&select_inbound(&civilian), TemplateId::SciBilletNomination));

        let mut military = request(RequestType::In, EmploymentType::Military);
        military.access_code = Some(5);
        military.sensitivity_code = Some(4);
        assert!(!has(&select_inbound(&military), TemplateId::SciBilletNomination));
        military.has_sci = true;
        assert!(has(&select_inbound(&military), TemplateId::SciBilletNomination));

        let mut contractor = request(RequestType::In, EmploymentType::Contractor);
        contractor.has_sci = true;
        assert!(!has(&select_inbound(&contractor), TemplateId::SciBilletNomination));
    }

    #[test]
    fn civilian_only_tasks() {
        let civilian = templates(&select_inbound(&request(RequestType::In, EmploymentType::Civilian)));
        let military = templates(&select_inbound(&request(RequestType::In, EmploymentType::Military)));
        for id in [
            TemplateId::Create971Folder,
            TemplateId::PerformancePlan,
            TemplateId::AtaapsAccount,
            TemplateId::VerifyDirectDeposit,
            TemplateId::VerifyTaxStatus,
        ] {
            assert!(civilian.contains(&id), "civilian should get {id}");
            assert!(!military.contains(&id), "military should not get {id}");
        }
    }

    #[test]
    fn travel_tasks_need_government_traveler() {
        let mut contractor = request(RequestType::In, EmploymentType::Contractor);
        contractor.is_traveler = true;
        assert!(!has(&select_inbound(&contractor), TemplateId::TravelCoordination));

        let mut civilian = request(RequestType::In, EmploymentType::Civilian);
        assert!(!has(&select_inbound(&civilian), TemplateId::GtcApplication));
        civilian.is_traveler = true;
        let selections = select_inbound(&civilian);
        assert!(has(&selections, TemplateId::TravelCoordination));
        assert!(has(&selections, TemplateId::GtcApplication));
        assert!(has(&selections, TemplateId::DtsProfile));
    }

    #[test]
    fn supervisor_training_follows_flag() {
        let mut req = request(RequestType::In, EmploymentType::Contractor);
        assert!(!has(&select_inbound(&req), TemplateId::SupervisorTraining));
        req.is_supervisor = true;
        assert!(has(&select_inbound(&req), TemplateId::SupervisorTraining));
    }

    #[test]
    fn baseline_is_always_present_and_selection_has_no_duplicates() {
        for employment in [
            EmploymentType::Civilian,
            EmploymentType::Military,
            EmploymentType::Contractor,
        ] {
            let mut req = request(RequestType::In, employment);
            req.is_new_to_org = true;
            req.is_traveler = true;
            req.is_supervisor = true;
            req.has_sci = true;
            let selected = templates(&select_inbound(&req));
            for id in BASELINE {
                assert!(selected.contains(id));
            }
            let mut deduped = selected.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(deduped.len(), selected.len());
        }
    }
}
