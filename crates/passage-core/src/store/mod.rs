//! Record-store collaborator: persistence of requests, checklist items and
//! lead assignments.
//!
//! The library never picks a store itself. Callers construct one (a
//! [`MemoryStore`] for development and tests, a [`SqliteStore`] for durable
//! use) and pass it in as `&dyn RecordStore`.
//!
//! # Concurrency
//!
//! Every checklist item carries a `version` that the store bumps on each
//! write. [`RecordStore::update_item`] takes the version the caller last saw
//! and fails with [`StoreError::Conflict`] if another writer got there first.
//! Passing `None` skips the check.
//!
//! # Batches
//!
//! A [`Batch`] is a transport optimization, not a transaction: each queued
//! operation succeeds or fails on its own and the per-operation results come
//! back in queue order. An `Err` from [`RecordStore::execute_batch`] itself
//! means the call never reached the backend and nothing is known to have
//! been written.

pub mod memory;
pub mod schema;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{
    ChecklistItem, ItemId, ItemPatch, NewChecklistItem, NewRequest, Person, Request, RequestId,
    RequestPatch, RequestStatus, RequestType, Role,
};
use crate::templates::TemplateId;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Boxed backend cause carried by [`StoreError::Backend`].
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Kind of record named in a [`StoreError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Request,
    Item,
    Lead,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Request => "request",
            Self::Item => "checklist item",
            Self::Lead => "lead assignment",
        })
    }
}

/// Failure reported by a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: String },

    #[error("item {item} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        item: ItemId,
        expected: u64,
        actual: u64,
    },

    /// A status patch lost to a concurrent cancel or close.
    #[error("request {request} is already {status}")]
    StatusChanged {
        request: RequestId,
        status: RequestStatus,
    },

    #[error("store backend error: {0}")]
    Backend(#[source] BackendError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Reject a status patch that `current` cannot take.
    pub(crate) fn check_status_patch(
        id: RequestId,
        current: RequestStatus,
        patch: &RequestPatch,
    ) -> Result<(), Self> {
        match patch.status {
            Some(target) if current.can_transition_to(target).is_err() => {
                Err(Self::StatusChanged {
                    request: id,
                    status: current,
                })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn request_not_found(id: RequestId) -> Self {
        Self::NotFound {
            kind: RecordKind::Request,
            id: id.to_string(),
        }
    }

    pub(crate) fn item_not_found(id: ItemId) -> Self {
        Self::NotFound {
            kind: RecordKind::Item,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(Box::new(err))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Criteria for [`RecordStore::query_requests`]. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub request_type: Option<RequestType>,
    /// Compared case-insensitively.
    pub supervisor_email: Option<String>,
    pub limit: Option<u32>,
}

impl RequestFilter {
    #[must_use]
    pub fn matches(&self, request: &Request) -> bool {
        self.status.is_none_or(|status| request.status == status)
            && self
                .request_type
                .is_none_or(|request_type| request.request_type == request_type)
            && self.supervisor_email.as_deref().is_none_or(|email| {
                request.supervisor.email_key() == email.trim().to_ascii_lowercase()
            })
    }
}

/// Criteria for [`RecordStore::query_items`]. Results are ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub request_id: Option<RequestId>,
    pub lead: Option<Role>,
    pub template: Option<TemplateId>,
    /// Only active, not yet completed items.
    pub outstanding_only: bool,
}

impl ItemFilter {
    /// Every item of one request's checklist.
    #[must_use]
    pub fn for_request(request_id: RequestId) -> Self {
        Self {
            request_id: Some(request_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, item: &ChecklistItem) -> bool {
        self.request_id.is_none_or(|id| item.request_id == id)
            && self.lead.is_none_or(|lead| item.lead == lead)
            && self.template.is_none_or(|template| item.template == template)
            && (!self.outstanding_only || item.is_outstanding())
    }
}

/// One queued batch operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    CreateItem(NewChecklistItem),
    UpdateItem {
        id: ItemId,
        patch: ItemPatch,
        expected_version: Option<u64>,
    },
}

/// Operations submitted to the store in a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_item(&mut self, item: NewChecklistItem) -> &mut Self {
        self.ops.push(BatchOp::CreateItem(item));
        self
    }

    pub fn update_item(
        &mut self,
        id: ItemId,
        patch: ItemPatch,
        expected_version: Option<u64>,
    ) -> &mut Self {
        self.ops.push(BatchOp::UpdateItem {
            id,
            patch,
            expected_version,
        });
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// A person staffing a lead role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadAssignment {
    pub role: Role,
    pub person: Person,
}

/// Per-operation outcome of a batch, in queue order.
pub type BatchResults = Vec<Result<ChecklistItem, StoreError>>;

/// Persistence of requests, checklist items and lead assignments.
pub trait RecordStore: Send + Sync {
    /// Persist a new request with status `Active`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn create_request(&self, new: NewRequest) -> Result<Request, StoreError>;

    /// Apply `patch` to a stored request and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id,
    /// [`StoreError::StatusChanged`] when `patch.status` is not a valid
    /// transition from the stored status, or a backend error. The status
    /// check and the write happen atomically.
    fn update_request(&self, id: RequestId, patch: RequestPatch) -> Result<Request, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or a backend error.
    fn get_request(&self, id: RequestId) -> Result<Request, StoreError>;

    /// Requests matching `filter`, newest id first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn query_requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id, or a backend error.
    fn get_item(&self, id: ItemId) -> Result<ChecklistItem, StoreError>;

    /// Apply `patch` to one item, bumping its version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if `expected_version` is given and
    /// does not match the stored version, [`StoreError::NotFound`] for an
    /// unknown id, or a backend error.
    fn update_item(
        &self,
        id: ItemId,
        patch: ItemPatch,
        expected_version: Option<u64>,
    ) -> Result<ChecklistItem, StoreError>;

    /// Items matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn query_items(&self, filter: &ItemFilter) -> Result<Vec<ChecklistItem>, StoreError>;

    /// Run every queued operation and report each outcome.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the call as a whole failed and no
    /// per-operation outcome is known.
    fn execute_batch(&self, batch: Batch) -> Result<BatchResults, StoreError>;

    /// Lead assignments, optionally for one role, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    fn list_leads(&self, role: Option<Role>) -> Result<Vec<LeadAssignment>, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn insert_lead(&self, assignment: &LeadAssignment) -> Result<(), StoreError>;

    /// Remove the assignment of `email` to `role`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn delete_lead(&self, role: Role, email: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EmploymentType, NewChecklistItem};

    #[test]
    fn batch_queues_in_order() {
        let mut batch = Batch::new();
        assert!(batch.is_empty());
        batch
            .create_item(NewChecklistItem {
                request_id: RequestId(1),
                template: TemplateId::Bookmarks,
                title: "t".to_string(),
                description: "d".to_string(),
                lead: Role::Employee,
                active: true,
            })
            .update_item(ItemId(9), ItemPatch::activate(), Some(2));

        assert_eq!(batch.len(), 2);
        assert!(matches!(batch.ops()[0], BatchOp::CreateItem(_)));
        assert!(matches!(
            batch.ops()[1],
            BatchOp::UpdateItem {
                id: ItemId(9),
                expected_version: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn item_filter_outstanding_only() {
        let mut item = ChecklistItem::from_new(
            ItemId(1),
            NewChecklistItem {
                request_id: RequestId(4),
                template: TemplateId::PhoneSetup,
                title: String::new(),
                description: String::new(),
                lead: Role::Employee,
                active: false,
            },
        );
        let filter = ItemFilter {
            outstanding_only: true,
            ..ItemFilter::for_request(RequestId(4))
        };
        assert!(!filter.matches(&item));
        item.active = true;
        assert!(filter.matches(&item));
        assert!(!ItemFilter::for_request(RequestId(5)).matches(&item));
    }

    #[test]
    fn request_filter_compares_supervisor_email_case_insensitively() {
        let request = crate::rules::test_support::request(RequestType::In, EmploymentType::Civilian);
        let filter = RequestFilter {
            supervisor_email: Some(" SAM.Lead@example.mil".to_string()),
            status: Some(RequestStatus::Active),
            ..RequestFilter::default()
        };
        assert!(filter.matches(&request));
        let closed = RequestFilter {
            status: Some(RequestStatus::Closed),
            ..RequestFilter::default()
        };
        assert!(!closed.matches(&request));
    }

    #[test]
    fn errors_render_operation_context() {
        let err = StoreError::Conflict {
            item: ItemId(3),
            expected: 1,
            actual: 2,
        };
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "item 3 was modified concurrently (expected version 1, found 2)"
        );
        assert_eq!(
            StoreError::request_not_found(RequestId(8)).to_string(),
            "request 8 not found"
        );
    }
}
