//! Property tests for template selection and materialization.

use std::collections::HashSet;

use passage_core::materialize::Materializer;
use passage_core::model::{EmploymentType, RequestType};
use passage_core::rules::{self, Selection};
use passage_core::store::{ItemFilter, MemoryStore, RecordStore};
use passage_core::templates::{Registry, TemplateId};
use proptest::prelude::*;

use generators::*;

fn templates(selections: &[Selection]) -> HashSet<TemplateId> {
    selections.iter().map(|s| s.template).collect()
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn contractors_get_contractor_credential_and_sponsorship(
        request in arb_request(RequestType::In, Just(EmploymentType::Contractor))
    ) {
        let selected = templates(&rules::select_inbound(&request));
        prop_assert!(selected.contains(&TemplateId::ObtainContractorCredential));
        prop_assert!(!selected.contains(&TemplateId::ObtainGovernmentCredential));
        prop_assert!(selected.contains(&TemplateId::SponsorshipInitiation));
        prop_assert!(selected.contains(&TemplateId::SponsorshipCoordination));
    }

    #[test]
    fn returning_government_staff_start_with_active_credential(
        mut new in arb_new_request(RequestType::In, arb_government_type())
    ) {
        new.is_new_to_org = false;
        let store = MemoryStore::new();
        let request = store.create_request(new).unwrap();

        let registry = Registry::builtin();
        prop_assert!(!registry.get(TemplateId::ObtainGovernmentCredential).prerequisites.is_empty());

        let report = Materializer::new(&store, registry)
            .materialize(request.id, &rules::select(&request))
            .unwrap();
        let credential = report
            .created()
            .find(|item| item.template == TemplateId::ObtainGovernmentCredential);
        prop_assert!(credential.is_some_and(|item| item.active));
    }

    #[test]
    fn outbound_items_are_active_iff_template_has_no_prerequisites(
        request in arb_request(RequestType::Out, arb_employment_type())
    ) {
        let registry = Registry::builtin();
        let selections = rules::select_outbound(&request);
        prop_assert!(selections.iter().all(|s| s.override_active.is_none()));

        let store = MemoryStore::new();
        let materializer = Materializer::new(&store, registry);
        for selection in selections {
            let item = materializer.new_item(request.id, selection);
            prop_assert_eq!(
                item.active,
                registry.get(selection.template).prerequisites.is_empty()
            );
        }
    }

    #[test]
    fn selection_is_idempotent(request in arb_any_request()) {
        prop_assert_eq!(rules::select(&request), rules::select(&request));
    }

    #[test]
    fn selection_has_no_duplicates_and_matches_request_type(request in arb_any_request()) {
        let selections = rules::select(&request);
        let unique = templates(&selections);
        prop_assert_eq!(unique.len(), selections.len());
        let registry = Registry::builtin();
        for id in unique {
            prop_assert_eq!(registry.get(id).request_type, request.request_type);
        }
    }

    #[test]
    fn only_the_government_credential_is_ever_overridden(request in arb_any_request()) {
        for selection in rules::select(&request) {
            if selection.override_active.is_some() {
                prop_assert_eq!(selection.template, TemplateId::ObtainGovernmentCredential);
                prop_assert_eq!(selection.override_active, Some(true));
            }
        }
    }

    #[test]
    fn n_selections_make_n_verbatim_items(
        new in arb_new_request(RequestType::In, arb_employment_type())
    ) {
        let store = MemoryStore::new();
        let request = store.create_request(new).unwrap();
        let selections = rules::select(&request);
        let registry = Registry::builtin();

        let report = Materializer::new(&store, registry)
            .materialize(request.id, &selections)
            .unwrap();
        prop_assert!(report.is_complete());

        let stored = store.query_items(&ItemFilter::for_request(request.id)).unwrap();
        prop_assert_eq!(stored.len(), selections.len());
        for (selection, item) in selections.iter().zip(report.created()) {
            let template = registry.get(selection.template);
            prop_assert_eq!(item.template, template.id);
            prop_assert_eq!(item.lead, template.lead);
            prop_assert_eq!(&item.title, &template.title);
            prop_assert_eq!(&item.description, &template.description);
        }
    }
}
