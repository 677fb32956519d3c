//! Turn template selections into persisted checklist items.
//!
//! All creates for one request go to the store as a single [`Batch`]. The
//! batch is not atomic: some items may be created while others fail, and the
//! report says which. Callers decide whether to retry the missing ones (see
//! [`Materializer::missing_selections`]).

use std::collections::{BTreeMap, HashSet};

use crate::activation::cascade;
use crate::error::{ApiError, Operation};
use crate::model::{ChecklistItem, NewChecklistItem, RequestId, Role};
use crate::rules::Selection;
use crate::store::{Batch, RecordStore, StoreError};
use crate::templates::{Registry, TemplateId};

/// Result of creating one selected item.
#[derive(Debug)]
pub enum ItemOutcome {
    Created(ChecklistItem),
    Failed {
        template: TemplateId,
        error: StoreError,
    },
}

impl ItemOutcome {
    #[must_use]
    pub const fn template(&self) -> TemplateId {
        match self {
            Self::Created(item) => item.template,
            Self::Failed { template, .. } => *template,
        }
    }

    #[must_use]
    pub const fn created(&self) -> Option<&ChecklistItem> {
        match self {
            Self::Created(item) => Some(item),
            Self::Failed { .. } => None,
        }
    }
}

/// Per-item outcomes, in the order the selections were given.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl MaterializeReport {
    pub fn created(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.outcomes.iter().filter_map(ItemOutcome::created)
    }

    pub fn failures(&self) -> impl Iterator<Item = (TemplateId, &StoreError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ItemOutcome::Failed { template, error } => Some((*template, error)),
            ItemOutcome::Created(_) => None,
        })
    }

    /// Every selection produced an item.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Created items grouped by lead role.
    #[must_use]
    pub fn created_by_lead(&self) -> BTreeMap<Role, Vec<ChecklistItem>> {
        let mut grouped: BTreeMap<Role, Vec<ChecklistItem>> = BTreeMap::new();
        for item in self.created() {
            grouped.entry(item.lead).or_default().push(item.clone());
        }
        grouped
    }
}

/// Expands selections into checklist items using a template registry.
#[derive(Clone, Copy)]
pub struct Materializer<'a> {
    store: &'a dyn RecordStore,
    registry: &'a Registry,
}

impl<'a> Materializer<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn RecordStore, registry: &'a Registry) -> Self {
        Self { store, registry }
    }

    /// Build the item that `selection` produces for `request_id`.
    ///
    /// Title, description and lead are copied verbatim from the template.
    #[must_use]
    pub fn new_item(&self, request_id: RequestId, selection: Selection) -> NewChecklistItem {
        let template = self.registry.get(selection.template);
        NewChecklistItem {
            request_id,
            template: template.id,
            title: template.title.clone(),
            description: template.description.clone(),
            lead: template.lead,
            active: selection
                .override_active
                .unwrap_or_else(|| template.starts_active()),
        }
    }

    /// Create one item per selection in a single store batch.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the batch call itself failed, in which case no
    /// item is known to exist. Individual item failures are reported in the
    /// returned [`MaterializeReport`] instead.
    pub fn materialize(
        &self,
        request_id: RequestId,
        selections: &[Selection],
    ) -> Result<MaterializeReport, ApiError> {
        let mut batch = Batch::new();
        for selection in selections {
            batch.create_item(self.new_item(request_id, *selection));
        }

        let results = self
            .store
            .execute_batch(batch)
            .map_err(ApiError::during(Operation::CreateChecklist))?;

        let outcomes: Vec<ItemOutcome> = selections
            .iter()
            .zip(results)
            .map(|(selection, result)| match result {
                Ok(item) => ItemOutcome::Created(item),
                Err(error) => ItemOutcome::Failed {
                    template: selection.template,
                    error,
                },
            })
            .collect();

        let report = MaterializeReport { outcomes };
        let failed = report.failures().count();
        if failed > 0 {
            tracing::warn!(
                request_id = %request_id,
                failed,
                requested = selections.len(),
                "checklist created partially"
            );
        } else {
            tracing::info!(request_id = %request_id, items = selections.len(), "checklist created");
        }
        Ok(report)
    }

    /// Selections whose template has no item in `existing` yet.
    ///
    /// A missing template that a completed item in `existing` would have
    /// activated is selected active, since its trigger will not fire again.
    #[must_use]
    pub fn missing_selections(
        existing: &[ChecklistItem],
        selections: &[Selection],
    ) -> Vec<Selection> {
        let present: HashSet<TemplateId> = existing.iter().map(|item| item.template).collect();
        let triggered = cascade::triggered(existing);
        selections
            .iter()
            .filter(|selection| !present.contains(&selection.template))
            .map(|selection| {
                if triggered.contains(&selection.template) {
                    Selection::active(selection.template)
                } else {
                    *selection
                }
            })
            .collect()
    }
}
