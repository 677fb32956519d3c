use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ItemId, Person, RequestId, Role};
use crate::templates::TemplateId;

/// Derived lifecycle state of a checklist item.
///
/// Stored as two fields (`active`, `completed_at`); this enum is the view the
/// activation engine reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Inactive,
    Active,
    Completed,
}

impl ItemState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `inactive -> active` (cascade)
    /// - `active -> completed` (lead marks done)
    /// - `completed -> active` (administrative reactivation)
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for anything else. In particular an
    /// inactive item cannot be completed.
    pub fn can_transition_to(self, target: Self) -> Result<(), InvalidTransition> {
        if self == target {
            return Err(InvalidTransition {
                from: self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        let allowed = matches!(
            (self, target),
            (Self::Inactive, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Completed, Self::Active)
        );

        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: target,
                reason: "transition not allowed by checklist rules",
            })
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an item state transition is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ItemState,
    pub to: ItemState,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move item from {} to {}: {}", self.from, self.to, self.reason)
    }
}

impl std::error::Error for InvalidTransition {}

/// An item as sent to the store for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChecklistItem {
    pub request_id: RequestId,
    pub template: TemplateId,
    pub title: String,
    pub description: String,
    pub lead: Role,
    pub active: bool,
}

/// A persisted checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: ItemId,
    pub request_id: RequestId,
    pub template: TemplateId,
    pub title: String,
    pub description: String,
    pub lead: Role,
    pub active: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Person>,
    /// Bumped by the store on every update.
    pub version: u64,
}

impl ChecklistItem {
    #[must_use]
    pub fn from_new(id: ItemId, new: NewChecklistItem) -> Self {
        Self {
            id,
            request_id: new.request_id,
            template: new.template,
            title: new.title,
            description: new.description,
            lead: new.lead,
            active: new.active,
            completed_at: None,
            completed_by: None,
            version: 1,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ItemState {
        if self.completed_at.is_some() {
            ItemState::Completed
        } else if self.active {
            ItemState::Active
        } else {
            ItemState::Inactive
        }
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Active and not yet completed: actionable by its lead.
    #[must_use]
    pub const fn is_outstanding(&self) -> bool {
        self.active && self.completed_at.is_none()
    }

    /// Apply a partial update in place. Does not touch `version`.
    pub fn apply(&mut self, patch: &ItemPatch) {
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = completed_at;
        }
        if let Some(completed_by) = &patch.completed_by {
            self.completed_by.clone_from(completed_by);
        }
    }
}

/// Partial update of the mutable item fields.
///
/// The double `Option` on completion fields distinguishes "leave alone"
/// (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub active: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub completed_by: Option<Option<Person>>,
}

impl ItemPatch {
    #[must_use]
    pub fn activate() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn complete(by: Person, at: DateTime<Utc>) -> Self {
        Self {
            active: Some(true),
            completed_at: Some(Some(at)),
            completed_by: Some(Some(by)),
        }
    }

    #[must_use]
    pub fn reactivate() -> Self {
        Self {
            active: Some(true),
            completed_at: Some(None),
            completed_by: Some(None),
        }
    }
}
