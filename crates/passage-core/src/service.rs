//! Request-level flows: submit, complete, cancel, close.
//!
//! Each flow persists its state change first and notifies second. A
//! notification failure is reported alongside the result and never turns a
//! persisted change into an error.

use chrono::Utc;

use crate::activation::{ActivationEngine, Completion, Reapplied};
use crate::config::WorkflowConfig;
use crate::error::{ApiError, Operation, ProcessingError};
use crate::materialize::{MaterializeReport, Materializer};
use crate::model::request::RequestValidationError;
use crate::model::{
    ChecklistItem, ItemId, NewRequest, Person, Request, RequestId, RequestPatch, RequestStatus,
};
use crate::notify::{Notifier, NotifyReport};
use crate::rules;
use crate::store::{ItemFilter, RecordStore, RequestFilter, StoreError};
use crate::templates::Registry;

/// Result of submitting (or re-materializing) a request.
#[derive(Debug)]
pub struct Submission {
    pub request: Request,
    pub checklist: MaterializeReport,
    /// Existing items a retry activated because their trigger was already
    /// completed. Always empty on first submission.
    pub reapplied: Reapplied,
    pub notifications: NotifyReport,
}

#[derive(Debug)]
pub struct ItemCompletion {
    pub completion: Completion,
    /// Set when the completion finished the checklist and auto-close closed
    /// the request.
    pub closed: Option<Request>,
    pub notifications: NotifyReport,
}

/// Result of cancelling or closing a request.
#[derive(Debug)]
pub struct StatusChange {
    pub request: Request,
    pub notifications: NotifyReport,
}

pub struct ProcessingService<'a> {
    store: &'a dyn RecordStore,
    registry: &'a Registry,
    notifier: Notifier<'a>,
    workflow: WorkflowConfig,
}

impl<'a> ProcessingService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn RecordStore,
        registry: &'a Registry,
        notifier: Notifier<'a>,
        workflow: WorkflowConfig,
    ) -> Self {
        Self {
            store,
            registry,
            notifier,
            workflow,
        }
    }

    fn materializer(&self) -> Materializer<'a> {
        Materializer::new(self.store, self.registry)
    }

    /// Store a new request, generate its checklist and notify the leads with
    /// work they can start now.
    ///
    /// Items that fail to create are listed in [`Submission::checklist`];
    /// [`ProcessingService::retry_checklist`] creates just those.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::Validation`] before anything is stored
    /// - [`ProcessingError::Api`] if the request cannot be stored
    /// - [`ProcessingError::ChecklistNotCreated`] if the request was stored
    ///   but the checklist batch failed as a whole
    pub fn submit(&self, new: NewRequest) -> Result<Submission, ProcessingError> {
        new.validate()?;
        let request = self
            .store
            .create_request(new)
            .map_err(ApiError::during(Operation::CreateRequest))?;
        tracing::info!(
            request_id = %request.id,
            request_type = %request.request_type,
            employment_type = %request.employment_type,
            "request submitted"
        );

        let selections = rules::select(&request);
        let checklist = self
            .materializer()
            .materialize(request.id, &selections)
            .map_err(|source| ProcessingError::ChecklistNotCreated {
                request: request.id,
                source,
            })?;

        let created: Vec<ChecklistItem> = checklist.created().cloned().collect();
        let notifications = self.notifier.submission(&request, &created);
        Ok(Submission {
            request,
            checklist,
            reapplied: Reapplied::default(),
            notifications,
        })
    }

    /// Re-run selection for a stored request and create only the items that
    /// do not exist yet. Leads are notified about the new active ones.
    ///
    /// Also repairs cascades: a missing item whose trigger is already
    /// completed is created active, and existing inactive items in the same
    /// position are activated.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::RequestNotActive`] for cancelled or closed
    ///   requests
    /// - [`ProcessingError::Api`] if loading the request or checklist, or
    ///   the batch call itself, fails
    pub fn retry_checklist(&self, request_id: RequestId) -> Result<Submission, ProcessingError> {
        let request = self.active_request(request_id)?;
        let existing = self.checklist(request_id)?;
        let missing = Materializer::missing_selections(&existing, &rules::select(&request));
        let reapplied = ActivationEngine::new(self.store).reapply(&existing);

        if missing.is_empty() && reapplied.activated.is_empty() && reapplied.failures.is_empty() {
            tracing::debug!(request_id = %request_id, "checklist already complete");
            return Ok(Submission {
                request,
                checklist: MaterializeReport::default(),
                reapplied,
                notifications: NotifyReport::default(),
            });
        }

        let checklist = if missing.is_empty() {
            MaterializeReport::default()
        } else {
            tracing::info!(
                request_id = %request_id,
                missing = missing.len(),
                "retrying checklist creation"
            );
            self.materializer().materialize(request_id, &missing)?
        };
        let created: Vec<ChecklistItem> = checklist.created().cloned().collect();
        let mut notifications = self.notifier.submission(&request, &created);
        notifications.merge(
            self.notifier
                .activation(&request, &reapplied.activated, &existing),
        );
        Ok(Submission {
            request,
            checklist,
            reapplied,
            notifications,
        })
    }

    /// Complete an item, cascade, and email leads whose work just became
    /// actionable.
    ///
    /// With `workflow.auto_close` set, finishing the last item also closes
    /// the request. A failed auto-close is logged and leaves the request
    /// active; the completion itself still succeeds.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::RequestNotActive`] if the item's request is
    ///   cancelled or closed
    /// - anything [`ActivationEngine::complete`] returns
    pub fn complete_item(
        &self,
        item_id: ItemId,
        by: &Person,
    ) -> Result<ItemCompletion, ProcessingError> {
        let request = self.request_for_item(item_id)?;
        let completion = ActivationEngine::new(self.store).complete(item_id, by, Utc::now())?;
        let mut notifications = self.notifier.activation(
            &request,
            &completion.activated,
            completion.checklist.as_deref().unwrap_or_default(),
        );

        let mut closed = None;
        if self.workflow.auto_close && completion.checklist_complete() {
            match self.close(request.id) {
                Ok(change) => {
                    notifications.merge(change.notifications);
                    closed = Some(change.request);
                }
                Err(err) => {
                    tracing::warn!(request_id = %request.id, error = %err, "auto-close failed");
                }
            }
        }

        Ok(ItemCompletion {
            completion,
            closed,
            notifications,
        })
    }

    /// Administrative reopening of a completed item. No cascade, no email.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::RequestNotActive`] if the request is cancelled
    ///   or closed
    /// - anything [`ActivationEngine::reactivate`] returns
    pub fn reactivate_item(&self, item_id: ItemId) -> Result<ChecklistItem, ProcessingError> {
        self.request_for_item(item_id)?;
        ActivationEngine::new(self.store).reactivate(item_id)
    }

    /// Cancel an active request and tell everyone on its checklist.
    ///
    /// Once the status change is stored the call succeeds. If the checklist
    /// cannot be read for the notice, only the employee and supervisor are
    /// told.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::RequestNotActive`] unless the request is active
    /// - [`ProcessingError::Api`] if the status change cannot be stored
    pub fn cancel(
        &self,
        request_id: RequestId,
        reason: Option<&str>,
    ) -> Result<StatusChange, ProcessingError> {
        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let request = self.transition(
            request_id,
            RequestPatch {
                status: Some(RequestStatus::Cancelled),
                cancel_reason: reason,
                ..RequestPatch::default()
            },
        )?;
        tracing::info!(request_id = %request_id, "request cancelled");

        let items = self.checklist(request_id).unwrap_or_else(|err| {
            tracing::warn!(
                request_id = %request_id,
                error = %err,
                "checklist unreadable, cancellation goes to employee and supervisor only"
            );
            Vec::new()
        });
        let notifications =
            self.notifier
                .cancellation(&request, &items, request.cancel_reason.as_deref());
        Ok(StatusChange {
            request,
            notifications,
        })
    }

    /// # Errors
    ///
    /// - [`ProcessingError::RequestNotActive`] unless the request is active
    /// - [`ProcessingError::Api`] on store failures
    pub fn close(&self, request_id: RequestId) -> Result<StatusChange, ProcessingError> {
        let request = self.transition(
            request_id,
            RequestPatch {
                status: Some(RequestStatus::Closed),
                closed_at: Some(Utc::now()),
                ..RequestPatch::default()
            },
        )?;
        tracing::info!(request_id = %request_id, "request closed");

        let notifications = self.notifier.completion(&request);
        Ok(StatusChange {
            request,
            notifications,
        })
    }

    /// Edit descriptive fields. The checklist is not regenerated.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::Validation`] if the patch touches status fields
    /// - [`ProcessingError::RequestNotActive`] unless the request is active
    /// - [`ProcessingError::Api`] on store failures
    pub fn update_request(
        &self,
        request_id: RequestId,
        patch: RequestPatch,
    ) -> Result<Request, ProcessingError> {
        if patch.status.is_some() || patch.cancel_reason.is_some() || patch.closed_at.is_some() {
            return Err(RequestValidationError {
                field: "status",
                reason: "use cancel or close to change the request status",
            }
            .into());
        }
        if let Some(name) = &patch.employee_name
            && name.trim().is_empty()
        {
            return Err(RequestValidationError {
                field: "employee_name",
                reason: "must not be empty",
            }
            .into());
        }

        self.active_request(request_id)?;
        let request = self
            .store
            .update_request(request_id, patch)
            .map_err(ApiError::during(Operation::UpdateRequest))?;
        tracing::info!(request_id = %request_id, "request updated");
        Ok(request)
    }

    /// # Errors
    ///
    /// Returns [`ProcessingError::Api`] if the request cannot be loaded.
    pub fn request(&self, request_id: RequestId) -> Result<Request, ProcessingError> {
        Ok(self
            .store
            .get_request(request_id)
            .map_err(ApiError::during(Operation::LoadRequest))?)
    }

    /// Requests matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::Api`] if the query fails.
    pub fn requests(&self, filter: &RequestFilter) -> Result<Vec<Request>, ProcessingError> {
        Ok(self
            .store
            .query_requests(filter)
            .map_err(ApiError::during(Operation::LoadRequest))?)
    }

    /// The request's items, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::Api`] if the items cannot be loaded.
    pub fn checklist(&self, request_id: RequestId) -> Result<Vec<ChecklistItem>, ProcessingError> {
        Ok(self
            .store
            .query_items(&ItemFilter::for_request(request_id))
            .map_err(ApiError::during(Operation::LoadChecklist))?)
    }

    fn active_request(&self, request_id: RequestId) -> Result<Request, ProcessingError> {
        let request = self.request(request_id)?;
        if !request.is_active() {
            return Err(ProcessingError::RequestNotActive {
                request: request_id,
                status: request.status,
            });
        }
        Ok(request)
    }

    fn request_for_item(&self, item_id: ItemId) -> Result<Request, ProcessingError> {
        let item = self
            .store
            .get_item(item_id)
            .map_err(ApiError::during(Operation::LoadItem))?;
        self.active_request(item.request_id)
    }

    fn transition(
        &self,
        request_id: RequestId,
        patch: RequestPatch,
    ) -> Result<Request, ProcessingError> {
        let current = self.request(request_id)?;
        if let Some(target) = patch.status
            && current.status.can_transition_to(target).is_err()
        {
            return Err(ProcessingError::RequestNotActive {
                request: request_id,
                status: current.status,
            });
        }
        self.store
            .update_request(request_id, patch)
            .map_err(|err| match err {
                StoreError::StatusChanged { request, status } => {
                    ProcessingError::RequestNotActive { request, status }
                }
                other => ApiError::new(Operation::UpdateRequest, other).into(),
            })
    }
}
