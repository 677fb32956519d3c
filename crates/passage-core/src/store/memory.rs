//! In-process record store with failure injection.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    Batch, BatchOp, BatchResults, ItemFilter, LeadAssignment, RecordStore, RequestFilter,
    StoreError,
};
use crate::model::{
    ChecklistItem, ItemId, ItemPatch, NewChecklistItem, NewRequest, Request, RequestId,
    RequestPatch, Role,
};
use crate::templates::TemplateId;

#[derive(Debug, Default)]
struct State {
    requests: BTreeMap<RequestId, Request>,
    items: BTreeMap<ItemId, ChecklistItem>,
    leads: Vec<LeadAssignment>,
    next_request: i64,
    next_item: i64,
}

#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    fail_next_batch: bool,
    failing_item_queries: usize,
    failing_templates: HashSet<TemplateId>,
    interleaved: HashMap<ItemId, ItemPatch>,
}

/// Thread-safe store held entirely in memory.
///
/// Besides serving as the development store it can be told to fail in
/// specific ways, which the test suites use to exercise partial batches and
/// write races deterministically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StoreError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults().unavailable = unavailable;
    }

    /// Fail the next [`RecordStore::execute_batch`] call as a whole.
    pub fn fail_next_batch(&self) {
        self.faults().fail_next_batch = true;
    }

    /// Fail the next `count` [`RecordStore::query_items`] calls with
    /// [`StoreError::Unavailable`].
    pub fn fail_item_queries(&self, count: usize) {
        self.faults().failing_item_queries = count;
    }

    /// Reject item creation for `template` inside batches.
    pub fn fail_creates_for(&self, template: TemplateId) {
        self.faults().failing_templates.insert(template);
    }

    /// Stop rejecting item creation for `template`.
    pub fn clear_create_failure(&self, template: TemplateId) {
        self.faults().failing_templates.remove(&template);
    }

    /// Simulate another writer: the next update of `id` first applies
    /// `patch` as a separate write, bumping the version underneath the
    /// caller.
    pub fn interleave_write(&self, id: ItemId, patch: ItemPatch) {
        self.faults().interleaved.insert(id, patch);
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.faults().unavailable {
            return Err(StoreError::Unavailable(
                "memory store is marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn create_item_locked(
        &self,
        state: &mut State,
        new: NewChecklistItem,
    ) -> Result<ChecklistItem, StoreError> {
        if self.faults().failing_templates.contains(&new.template) {
            return Err(StoreError::Backend(
                format!("injected create failure for {}", new.template).into(),
            ));
        }
        if !state.requests.contains_key(&new.request_id) {
            return Err(StoreError::request_not_found(new.request_id));
        }
        state.next_item += 1;
        let item = ChecklistItem::from_new(ItemId(state.next_item), new);
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn update_item_locked(
        &self,
        state: &mut State,
        id: ItemId,
        patch: &ItemPatch,
        expected_version: Option<u64>,
    ) -> Result<ChecklistItem, StoreError> {
        let interleaved = self.faults().interleaved.remove(&id);
        let item = state
            .items
            .get_mut(&id)
            .ok_or_else(|| StoreError::item_not_found(id))?;

        if let Some(other) = interleaved {
            item.apply(&other);
            item.version += 1;
        }

        if let Some(expected) = expected_version
            && expected != item.version
        {
            return Err(StoreError::Conflict {
                item: id,
                expected,
                actual: item.version,
            });
        }

        item.apply(patch);
        item.version += 1;
        Ok(item.clone())
    }
}

impl RecordStore for MemoryStore {
    fn create_request(&self, new: NewRequest) -> Result<Request, StoreError> {
        self.check_available()?;
        let mut state = self.state();
        state.next_request += 1;
        let request = Request::from_new(RequestId(state.next_request), new, Utc::now());
        state.requests.insert(request.id, request.clone());
        Ok(request)
    }

    fn update_request(&self, id: RequestId, patch: RequestPatch) -> Result<Request, StoreError> {
        self.check_available()?;
        let mut state = self.state();
        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| StoreError::request_not_found(id))?;
        StoreError::check_status_patch(id, request.status, &patch)?;
        request.apply(patch);
        Ok(request.clone())
    }

    fn get_request(&self, id: RequestId) -> Result<Request, StoreError> {
        self.check_available()?;
        self.state()
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::request_not_found(id))
    }

    fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError> {
        self.check_available()?;
        let state = self.state();
        let matching = state
            .requests
            .values()
            .rev()
            .filter(|request| filter.matches(request))
            .cloned();
        Ok(match filter.limit {
            Some(limit) => matching.take(limit as usize).collect(),
            None => matching.collect(),
        })
    }

    fn get_item(&self, id: ItemId) -> Result<ChecklistItem, StoreError> {
        self.check_available()?;
        self.state()
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::item_not_found(id))
    }

    fn update_item(
        &self,
        id: ItemId,
        patch: ItemPatch,
        expected_version: Option<u64>,
    ) -> Result<ChecklistItem, StoreError> {
        self.check_available()?;
        let mut state = self.state();
        self.update_item_locked(&mut state, id, &patch, expected_version)
    }

    fn query_items(&self, filter: &ItemFilter) -> Result<Vec<ChecklistItem>, StoreError> {
        self.check_available()?;
        {
            let mut faults = self.faults();
            if faults.failing_item_queries > 0 {
                faults.failing_item_queries -= 1;
                return Err(StoreError::Unavailable("injected item query failure".to_string()));
            }
        }
        Ok(self
            .state()
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    fn execute_batch(&self, batch: Batch) -> Result<BatchResults, StoreError> {
        self.check_available()?;
        if std::mem::take(&mut self.faults().fail_next_batch) {
            return Err(StoreError::Unavailable(
                "injected batch transport failure".to_string(),
            ));
        }

        let mut state = self.state();
        let results = batch
            .into_ops()
            .into_iter()
            .map(|op| match op {
                BatchOp::CreateItem(new) => self.create_item_locked(&mut state, new),
                BatchOp::UpdateItem {
                    id,
                    patch,
                    expected_version,
                } => self.update_item_locked(&mut state, id, &patch, expected_version),
            })
            .collect();
        Ok(results)
    }

    fn list_leads(&self, role: Option<Role>) -> Result<Vec<LeadAssignment>, StoreError> {
        self.check_available()?;
        Ok(self
            .state()
            .leads
            .iter()
            .filter(|lead| role.is_none_or(|role| lead.role == role))
            .cloned()
            .collect())
    }

    fn insert_lead(&self, assignment: &LeadAssignment) -> Result<(), StoreError> {
        self.check_available()?;
        self.state().leads.push(assignment.clone());
        Ok(())
    }

    fn delete_lead(&self, role: Role, email: &str) -> Result<bool, StoreError> {
        self.check_available()?;
        let key = email.trim().to_ascii_lowercase();
        let mut state = self.state();
        let before = state.leads.len();
        state
            .leads
            .retain(|lead| !(lead.role == role && lead.person.email_key() == key));
        Ok(state.leads.len() != before)
    }
}
