//! Completion state machine and activation cascades.
//!
//! # Completion
//!
//! Completing an item is a single versioned write. Only after it succeeds
//! are the item's cascade targets (see [`cascade`]) activated, each with its
//! own versioned write. Nothing is rolled back: once the completion is
//! stored, [`ActivationEngine::complete`] returns `Ok` and any target it
//! could not read or flip is reported in [`Completion::cascade_failures`].
//! [`ActivationEngine::reapply`] activates such stragglers later.
//!
//! # Races
//!
//! Two leads completing different items of the same request touch disjoint
//! rows. A version conflict on the completed item itself is returned to the
//! caller. A conflict on a cascade target means someone else wrote it
//! between our read and our write; the target is re-read once and the flip
//! is skipped if it is already active, retried otherwise.

pub mod cascade;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::{ApiError, Operation, ProcessingError};
use crate::model::{
    ChecklistItem, InvalidTransition, ItemId, ItemPatch, ItemState, Person, RequestId, Role,
};
use crate::store::{ItemFilter, RecordStore, StoreError};
use crate::templates::TemplateId;

/// Outcome of completing one item.
#[derive(Debug)]
pub struct Completion {
    /// The completed item as stored.
    pub item: ChecklistItem,
    /// Items this call activated, by lead role.
    pub activated: BTreeMap<Role, Vec<ChecklistItem>>,
    /// The request's whole checklist after the cascade, or `None` if it
    /// could not be read back.
    pub checklist: Option<Vec<ChecklistItem>>,
    /// Cascade targets that could not be activated.
    pub cascade_failures: Vec<(TemplateId, ApiError)>,
}

impl Completion {
    #[must_use]
    pub fn activated_count(&self) -> usize {
        self.activated.values().map(Vec::len).sum()
    }

    /// Every item of the request is completed. `false` when the checklist
    /// could not be read.
    #[must_use]
    pub fn checklist_complete(&self) -> bool {
        self.checklist
            .as_deref()
            .is_some_and(|items| items.iter().all(ChecklistItem::is_completed))
    }
}

/// Outcome of [`ActivationEngine::reapply`].
#[derive(Debug, Default)]
pub struct Reapplied {
    pub activated: BTreeMap<Role, Vec<ChecklistItem>>,
    pub failures: Vec<(TemplateId, ApiError)>,
}

pub struct ActivationEngine<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> ActivationEngine<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Mark an active item completed and activate its cascade targets.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::InvalidTransition`] if the item is inactive or
    ///   already completed
    /// - [`ProcessingError::Api`] if reading or writing the item fails
    ///   (including a version conflict)
    ///
    /// Failures after the completion is stored never surface as `Err`.
    pub fn complete(
        &self,
        item_id: ItemId,
        by: &Person,
        at: DateTime<Utc>,
    ) -> Result<Completion, ProcessingError> {
        let current = self
            .store
            .get_item(item_id)
            .map_err(ApiError::during(Operation::LoadItem))?;
        current
            .state()
            .can_transition_to(ItemState::Completed)
            .map_err(|source| ProcessingError::InvalidTransition {
                item: item_id,
                source,
            })?;

        let item = self
            .store
            .update_item(
                item_id,
                ItemPatch::complete(by.clone(), at),
                Some(current.version),
            )
            .map_err(ApiError::during(Operation::CompleteItem))?;
        tracing::info!(
            item_id = %item.id,
            request_id = %item.request_id,
            template = %item.template,
            by = %by.email,
            "checklist item completed"
        );

        let mut checklist = match self
            .store
            .query_items(&ItemFilter::for_request(item.request_id))
        {
            Ok(items) => Some(items),
            Err(err) => {
                tracing::warn!(
                    request_id = %item.request_id,
                    error = %err,
                    "checklist reload failed, loading cascade targets one by one"
                );
                None
            }
        };

        let mut activated: BTreeMap<Role, Vec<ChecklistItem>> = BTreeMap::new();
        let mut cascade_failures = Vec::new();

        for target in cascade::targets(item.template) {
            let candidate = match checklist.as_deref() {
                Some(items) => items.iter().find(|c| c.template == *target).cloned(),
                None => match self.load_target(item.request_id, *target) {
                    Ok(found) => found,
                    Err(err) => {
                        tracing::warn!(template = %target, error = %err, "cascade target unreadable");
                        cascade_failures.push((*target, err));
                        continue;
                    }
                },
            };
            let Some(candidate) = candidate else {
                continue;
            };
            if candidate.state() != ItemState::Inactive {
                continue;
            }
            match self.activate(&candidate) {
                Ok(Some(flipped)) => {
                    if let Some(slot) = checklist
                        .as_mut()
                        .and_then(|items| items.iter_mut().find(|c| c.id == flipped.id))
                    {
                        *slot = flipped.clone();
                    }
                    activated.entry(flipped.lead).or_default().push(flipped);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        item_id = %candidate.id,
                        template = %target,
                        error = %err,
                        "cascade activation failed"
                    );
                    cascade_failures.push((*target, err));
                }
            }
        }

        let completion = Completion {
            item,
            activated,
            checklist,
            cascade_failures,
        };
        if completion.activated_count() > 0 {
            tracing::info!(
                item_id = %completion.item.id,
                activated = completion.activated_count(),
                "cascade activated items"
            );
        }
        Ok(completion)
    }

    /// Activate inactive items whose cascade trigger is already completed.
    ///
    /// Repairs checklists where a cascade was cut short, or where a target
    /// was created after its trigger finished. `items` is one request's
    /// checklist as currently stored.
    #[must_use]
    pub fn reapply(&self, items: &[ChecklistItem]) -> Reapplied {
        let triggered = cascade::triggered(items);
        let mut reapplied = Reapplied::default();
        for candidate in items
            .iter()
            .filter(|c| c.state() == ItemState::Inactive && triggered.contains(&c.template))
        {
            match self.activate(candidate) {
                Ok(Some(flipped)) => {
                    tracing::info!(
                        item_id = %flipped.id,
                        template = %flipped.template,
                        "stalled cascade target activated"
                    );
                    reapplied
                        .activated
                        .entry(flipped.lead)
                        .or_default()
                        .push(flipped);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        item_id = %candidate.id,
                        error = %err,
                        "cascade activation failed"
                    );
                    reapplied.failures.push((candidate.template, err));
                }
            }
        }
        reapplied
    }

    fn load_target(
        &self,
        request_id: RequestId,
        template: TemplateId,
    ) -> Result<Option<ChecklistItem>, ApiError> {
        let filter = ItemFilter {
            template: Some(template),
            ..ItemFilter::for_request(request_id)
        };
        self.store
            .query_items(&filter)
            .map(|items| items.into_iter().next())
            .map_err(ApiError::during(Operation::LoadItem))
    }

    /// Flip one inactive item to active. Returns `None` if a concurrent
    /// writer already activated it.
    fn activate(&self, candidate: &ChecklistItem) -> Result<Option<ChecklistItem>, ApiError> {
        match self
            .store
            .update_item(candidate.id, ItemPatch::activate(), Some(candidate.version))
        {
            Ok(item) => Ok(Some(item)),
            Err(StoreError::Conflict { .. }) => {
                let fresh = self
                    .store
                    .get_item(candidate.id)
                    .map_err(ApiError::during(Operation::LoadItem))?;
                if fresh.active {
                    tracing::debug!(item_id = %fresh.id, "cascade target already active");
                    return Ok(None);
                }
                self.store
                    .update_item(fresh.id, ItemPatch::activate(), Some(fresh.version))
                    .map(Some)
                    .map_err(ApiError::during(Operation::ActivateItem))
            }
            Err(err) => Err(ApiError::new(Operation::ActivateItem, err)),
        }
    }

    /// Administrative `Completed -> Active`: clears completion fields. Does
    /// not cascade.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::InvalidTransition`] unless the item is completed
    /// - [`ProcessingError::Api`] if the read or versioned write fails
    pub fn reactivate(&self, item_id: ItemId) -> Result<ChecklistItem, ProcessingError> {
        let current = self
            .store
            .get_item(item_id)
            .map_err(ApiError::during(Operation::LoadItem))?;
        let state = current.state();
        if state != ItemState::Completed {
            return Err(ProcessingError::InvalidTransition {
                item: item_id,
                source: InvalidTransition {
                    from: state,
                    to: ItemState::Active,
                    reason: "only completed items can be reactivated",
                },
            });
        }

        let item = self
            .store
            .update_item(item_id, ItemPatch::reactivate(), Some(current.version))
            .map_err(ApiError::during(Operation::ReactivateItem))?;
        tracing::info!(item_id = %item.id, template = %item.template, "checklist item reactivated");
        Ok(item)
    }
}
