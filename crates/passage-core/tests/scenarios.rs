//! End-to-end scenarios over the rules, materializer and activation engine.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use passage_core::activation::ActivationEngine;
use passage_core::config::{NotifyConfig, WorkflowConfig};
use passage_core::leads::LeadRoster;
use passage_core::materialize::Materializer;
use passage_core::model::{
    ChecklistItem, EmploymentType, ItemId, ItemPatch, NewRequest, Person, Request, RequestId,
    RequestPatch, RequestStatus, RequestType, Role,
};
use passage_core::notify::{MemoryMailer, Notifier};
use passage_core::rules::{self, ExitReason};
use passage_core::service::ProcessingService;
use passage_core::store::{
    Batch, BatchResults, ItemFilter, LeadAssignment, MemoryStore, RecordStore, RequestFilter,
    SqliteStore, StoreError,
};
use passage_core::templates::{Registry, TemplateId};

fn new_request(request_type: RequestType, employment_type: EmploymentType) -> NewRequest {
    NewRequest {
        request_type,
        employee_name: "Pat Doe".to_string(),
        employee: None,
        employment_type,
        supervisor: Person::new("Sam Lead", "sam.lead@example.mil"),
        is_new_to_org: false,
        is_supervisor: false,
        is_traveler: false,
        has_sci: false,
        has_sipr: false,
        exit_reason: None,
        sensitivity_code: None,
        access_code: None,
        office_symbol: "XP".to_string(),
        position: None,
        grade_rank: None,
        work_location: passage_core::model::WorkLocation::Local,
        eta: None,
        exit_date: None,
    }
}

fn selected(new: NewRequest) -> HashSet<TemplateId> {
    let store = MemoryStore::new();
    let request = store.create_request(new).unwrap();
    rules::select(&request).into_iter().map(|s| s.template).collect()
}

fn submit(store: &dyn RecordStore, new: NewRequest) -> (RequestId, Vec<ChecklistItem>) {
    let request = store.create_request(new).unwrap();
    let report = Materializer::new(store, Registry::builtin())
        .materialize(request.id, &rules::select(&request))
        .unwrap();
    assert!(report.is_complete());
    (request.id, report.created().cloned().collect())
}

fn find(items: &[ChecklistItem], template: TemplateId) -> &ChecklistItem {
    items
        .iter()
        .find(|item| item.template == template)
        .unwrap_or_else(|| panic!("{template} not on checklist"))
}

fn active_flags(store: &dyn RecordStore, request_id: RequestId) -> BTreeMap<TemplateId, bool> {
    store
        .query_items(&ItemFilter::for_request(request_id))
        .unwrap()
        .into_iter()
        .map(|item| (item.template, item.active))
        .collect()
}

fn lead() -> Person {
    Person::new("Lee Lead", "lee.lead@example.mil")
}

#[test]
fn scenario_a_new_civilian_without_supervision_or_travel() {
    let mut new = new_request(RequestType::In, EmploymentType::Civilian);
    new.is_new_to_org = true;
    let set = selected(new);

    assert!(set.contains(&TemplateId::InstallationInProcessing));
    for excluded in [
        TemplateId::SupervisorTraining,
        TemplateId::TravelCoordination,
        TemplateId::GtcApplication,
        TemplateId::DtsProfile,
    ] {
        assert!(!set.contains(&excluded), "{excluded} should not be selected");
    }
}

#[test]
fn scenario_b_military_sci_needs_no_civilian_codes() {
    let mut new = new_request(RequestType::In, EmploymentType::Military);
    new.access_code = Some(5);
    new.has_sci = true;
    assert_eq!(new.sensitivity_code, None);
    assert!(selected(new).contains(&TemplateId::SciBilletNomination));
}

#[test]
fn scenario_c_retiring_civilian() {
    let mut new = new_request(RequestType::Out, EmploymentType::Civilian);
    new.exit_reason = Some(ExitReason::Retirement);
    let set = selected(new);

    assert!(set.contains(&TemplateId::ClearanceTermination));
    assert!(set.contains(&TemplateId::CloseAtaaps));
    assert!(set.contains(&TemplateId::CredentialTurnIn));
    assert!(!set.contains(&TemplateId::ConfirmCredentialTurnIn));
}

#[test]
fn scenario_c_transfer_to_non_af_dod_keeps_credential() {
    let mut new = new_request(RequestType::Out, EmploymentType::Military);
    new.exit_reason = Some(ExitReason::MoveToNonAfDod);
    let set = selected(new);
    assert!(set.contains(&TemplateId::ClearanceTermination));
    assert!(!set.contains(&TemplateId::CredentialTurnIn));
}

#[test]
fn scenario_d_installation_activates_only_government_credential() {
    let store = MemoryStore::new();
    let mut new = new_request(RequestType::In, EmploymentType::Civilian);
    new.is_new_to_org = true;
    let (request_id, items) = submit(&store, new);

    let credential = find(&items, TemplateId::ObtainGovernmentCredential);
    assert!(!credential.active, "new staff wait on installation in-processing");

    let before = active_flags(&store, request_id);
    let installation = find(&items, TemplateId::InstallationInProcessing);
    let completion = ActivationEngine::new(&store)
        .complete(installation.id, &lead(), Utc::now())
        .unwrap();
    let after = active_flags(&store, request_id);

    let changed: Vec<TemplateId> = before
        .iter()
        .filter(|(template, active)| after[template] != **active)
        .map(|(template, _)| *template)
        .collect();
    assert_eq!(changed, vec![TemplateId::ObtainGovernmentCredential]);
    assert_eq!(completion.activated_count(), 1);
    assert_eq!(
        completion.activated[&Role::Employee][0].template,
        TemplateId::ObtainGovernmentCredential
    );
}

fn concurrent_disjoint_completions(store: &dyn RecordStore) {
    let mut new = new_request(RequestType::In, EmploymentType::Civilian);
    new.is_traveler = true;
    let (request_id, items) = submit(store, new);

    let training = find(&items, TemplateId::CyberAwarenessTraining).id;
    let travel = find(&items, TemplateId::TravelCoordination).id;

    let (first, second) = std::thread::scope(|scope| {
        let a = scope.spawn(|| ActivationEngine::new(store).complete(training, &lead(), Utc::now()));
        let b = scope.spawn(|| ActivationEngine::new(store).complete(travel, &lead(), Utc::now()));
        (a.join().unwrap(), b.join().unwrap())
    });
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(
        first.activated[&Role::It][0].template,
        TemplateId::ProvisionNetworkAccount
    );
    assert_eq!(
        second.activated[&Role::Gtc][0].template,
        TemplateId::GtcApplication
    );
    assert!(first.cascade_failures.is_empty() && second.cascade_failures.is_empty());

    let flags = active_flags(store, request_id);
    assert!(flags[&TemplateId::ProvisionNetworkAccount]);
    assert!(flags[&TemplateId::GtcApplication]);
    assert!(!flags[&TemplateId::DtsProfile]);
    for id in [training, travel] {
        assert!(store.get_item(id).unwrap().is_completed());
    }
}

#[test]
fn scenario_e_concurrent_completions_memory_store() {
    concurrent_disjoint_completions(&MemoryStore::new());
}

#[test]
fn scenario_e_concurrent_completions_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("passage.sqlite3")).unwrap();
    concurrent_disjoint_completions(&store);
}

/// Wraps a store so its next few item queries fail.
struct FlakyItemReads<'a> {
    inner: &'a dyn RecordStore,
    failures_left: AtomicUsize,
}

impl<'a> FlakyItemReads<'a> {
    fn new(inner: &'a dyn RecordStore) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(0),
        }
    }

    fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }
}

impl RecordStore for FlakyItemReads<'_> {
    fn create_request(&self, new: NewRequest) -> Result<Request, StoreError> {
        self.inner.create_request(new)
    }

    fn update_request(&self, id: RequestId, patch: RequestPatch) -> Result<Request, StoreError> {
        self.inner.update_request(id, patch)
    }

    fn get_request(&self, id: RequestId) -> Result<Request, StoreError> {
        self.inner.get_request(id)
    }

    fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        self.inner.query_requests(filter)
    }

    fn get_item(&self, id: ItemId) -> Result<ChecklistItem, StoreError> {
        self.inner.get_item(id)
    }

    fn update_item(
        &self,
        id: ItemId,
        patch: ItemPatch,
        expected_version: Option<u64>,
    ) -> Result<ChecklistItem, StoreError> {
        self.inner.update_item(id, patch, expected_version)
    }

    fn query_items(&self, filter: &ItemFilter) -> Result<Vec<ChecklistItem>, StoreError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("blip".to_string()));
        }
        self.inner.query_items(filter)
    }

    fn execute_batch(&self, batch: Batch) -> Result<BatchResults, StoreError> {
        self.inner.execute_batch(batch)
    }

    fn list_leads(&self, role: Option<Role>) -> Result<Vec<LeadAssignment>, StoreError> {
        self.inner.list_leads(role)
    }

    fn insert_lead(&self, assignment: &LeadAssignment) -> Result<(), StoreError> {
        self.inner.insert_lead(assignment)
    }

    fn delete_lead(&self, role: Role, email: &str) -> Result<bool, StoreError> {
        self.inner.delete_lead(role, email)
    }
}

fn sqlite() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("passage.sqlite3")).unwrap();
    (dir, store)
}

#[test]
fn scenario_f_cascade_survives_failed_checklist_reload() {
    let (_dir, sqlite) = sqlite();
    let store = FlakyItemReads::new(&sqlite);
    let (request_id, items) = submit(&store, new_request(RequestType::In, EmploymentType::Civilian));
    let training = find(&items, TemplateId::SecurityTraining).id;

    store.fail_next(1);
    let completion = ActivationEngine::new(&store)
        .complete(training, &lead(), Utc::now())
        .unwrap();
    assert!(completion.checklist.is_none());
    assert!(completion.cascade_failures.is_empty());

    let flags = active_flags(&store, request_id);
    assert!(flags[&TemplateId::ConfirmSecurityTraining]);
    assert!(store.get_item(training).unwrap().is_completed());
}

#[test]
fn scenario_f_unreadable_cascade_target_is_repaired_later() {
    let (_dir, sqlite) = sqlite();
    let store = FlakyItemReads::new(&sqlite);
    let (request_id, items) = submit(&store, new_request(RequestType::In, EmploymentType::Civilian));
    let training = find(&items, TemplateId::SecurityTraining).id;

    store.fail_next(2);
    let engine = ActivationEngine::new(&store);
    let completion = engine.complete(training, &lead(), Utc::now()).unwrap();
    assert_eq!(
        completion.cascade_failures[0].0,
        TemplateId::ConfirmSecurityTraining
    );
    assert!(!active_flags(&store, request_id)[&TemplateId::ConfirmSecurityTraining]);

    let checklist = store.query_items(&ItemFilter::for_request(request_id)).unwrap();
    let reapplied = engine.reapply(&checklist);
    assert_eq!(
        reapplied.activated[&Role::Security][0].template,
        TemplateId::ConfirmSecurityTraining
    );
    assert!(active_flags(&store, request_id)[&TemplateId::ConfirmSecurityTraining]);
}

#[test]
fn scenario_g_retry_after_trigger_completed_creates_active_target() {
    let store = MemoryStore::new();
    let mailer = MemoryMailer::new();
    let roster = LeadRoster::new();
    let service = ProcessingService::new(
        &store,
        Registry::builtin(),
        Notifier::new(&mailer, &roster, NotifyConfig::default()),
        WorkflowConfig::default(),
    );
    let mut new = new_request(RequestType::In, EmploymentType::Civilian);
    new.is_new_to_org = true;

    store.fail_creates_for(TemplateId::ObtainGovernmentCredential);
    let submission = service.submit(new).unwrap();
    let request_id = submission.request.id;
    let installation = find(
        &submission.checklist.created().cloned().collect::<Vec<_>>(),
        TemplateId::InstallationInProcessing,
    )
    .id;
    service.complete_item(installation, &lead()).unwrap();

    store.clear_create_failure(TemplateId::ObtainGovernmentCredential);
    service.retry_checklist(request_id).unwrap();
    assert!(active_flags(&store, request_id)[&TemplateId::ObtainGovernmentCredential]);

    let credential = find(
        &service.checklist(request_id).unwrap(),
        TemplateId::ObtainGovernmentCredential,
    )
    .id;
    let done = service.complete_item(credential, &lead()).unwrap();
    assert!(done.completion.item.is_completed());
}

#[test]
fn scenario_h_cancel_stands_when_checklist_read_fails() {
    let (_dir, sqlite) = sqlite();
    let store = FlakyItemReads::new(&sqlite);
    let mailer = MemoryMailer::new();
    let roster = LeadRoster::new();
    let service = ProcessingService::new(
        &store,
        Registry::builtin(),
        Notifier::new(&mailer, &roster, NotifyConfig::default()),
        WorkflowConfig::default(),
    );
    let request_id = service
        .submit(new_request(RequestType::In, EmploymentType::Civilian))
        .unwrap()
        .request
        .id;

    store.fail_next(1);
    let change = service.cancel(request_id, Some("offer declined")).unwrap();
    assert_eq!(change.request.status, RequestStatus::Cancelled);
    assert_eq!(change.notifications.sent.len(), 1);
    assert!(
        mailer
            .sent()
            .last()
            .unwrap()
            .subject
            .starts_with("Cancelled:")
    );
    assert_eq!(
        sqlite.get_request(request_id).unwrap().status,
        RequestStatus::Cancelled
    );
}

#[test]
fn scenario_h_late_close_does_not_overwrite_cancel() {
    let (_dir, sqlite) = sqlite();
    let request_id = sqlite
        .create_request(new_request(RequestType::In, EmploymentType::Civilian))
        .unwrap()
        .id;
    sqlite
        .update_request(
            request_id,
            RequestPatch {
                status: Some(RequestStatus::Cancelled),
                ..RequestPatch::default()
            },
        )
        .unwrap();

    let late = sqlite.update_request(
        request_id,
        RequestPatch {
            status: Some(RequestStatus::Closed),
            closed_at: Some(Utc::now()),
            ..RequestPatch::default()
        },
    );
    assert!(matches!(late, Err(StoreError::StatusChanged { .. })));
    let stored = sqlite.get_request(request_id).unwrap();
    assert_eq!(stored.status, RequestStatus::Cancelled);
    assert!(stored.closed_at.is_none());
}
