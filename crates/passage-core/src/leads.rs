//! Lead directory: who staffs each lead role.
//!
//! Employee and Supervisor are parties to each request and resolve from the
//! request itself. Every other role is staffed by people assigned here.

use std::collections::BTreeMap;

use crate::error::ErrorCode;
use crate::model::{Person, Role};
use crate::store::{LeadAssignment, RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("{email} is already assigned to the {role} role")]
    DuplicateAssignment { role: Role, email: String },

    #[error("the {0} role is resolved from each request and cannot be assigned")]
    RequestParty(Role),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeadError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateAssignment { .. } => ErrorCode::DuplicateLeadAssignment,
            Self::RequestParty(_) => ErrorCode::InvalidEnumValue,
            Self::Store(StoreError::Unavailable(_)) => ErrorCode::StoreUnavailable,
            Self::Store(_) => ErrorCode::StoreBackendFailure,
        }
    }
}

/// Resolve a lead role to the people staffing it.
pub trait LeadDirectory {
    /// People assigned to `role`, in assignment order.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::Store`] if the backing store cannot be read.
    fn leads_for(&self, role: Role) -> Result<Vec<Person>, LeadError>;
}

fn check_assignable(existing: &[Person], role: Role, person: &Person) -> Result<(), LeadError> {
    if role.is_request_party() {
        return Err(LeadError::RequestParty(role));
    }
    let key = person.email_key();
    if existing.iter().any(|p| p.email_key() == key) {
        return Err(LeadError::DuplicateAssignment {
            role,
            email: person.email.trim().to_string(),
        });
    }
    Ok(())
}

/// In-memory directory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct LeadRoster {
    assignments: BTreeMap<Role, Vec<Person>>,
}

impl LeadRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`LeadError::DuplicateAssignment`] if `person` already holds
    /// `role`, or [`LeadError::RequestParty`] for Employee and Supervisor.
    pub fn assign(&mut self, role: Role, person: Person) -> Result<(), LeadError> {
        let people = self.assignments.entry(role).or_default();
        check_assignable(people, role, &person)?;
        people.push(person);
        Ok(())
    }

    /// Builder form of [`LeadRoster::assign`].
    ///
    /// # Errors
    ///
    /// See [`LeadRoster::assign`].
    pub fn with(mut self, role: Role, person: Person) -> Result<Self, LeadError> {
        self.assign(role, person)?;
        Ok(self)
    }

    /// Returns whether an assignment was removed.
    pub fn remove(&mut self, role: Role, email: &str) -> bool {
        let key = email.trim().to_ascii_lowercase();
        self.assignments.get_mut(&role).is_some_and(|people| {
            let before = people.len();
            people.retain(|p| p.email_key() != key);
            people.len() != before
        })
    }
}

impl LeadDirectory for LeadRoster {
    fn leads_for(&self, role: Role) -> Result<Vec<Person>, LeadError> {
        Ok(self.assignments.get(&role).cloned().unwrap_or_default())
    }
}

/// Directory persisted in a [`RecordStore`].
#[derive(Clone, Copy)]
pub struct StoreLeads<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> StoreLeads<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Assign `person` to `role`. The duplicate check runs before anything
    /// is written.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::DuplicateAssignment`], [`LeadError::RequestParty`]
    /// or a store failure.
    pub fn assign(&self, role: Role, person: Person) -> Result<(), LeadError> {
        let existing = self.leads_for(role)?;
        check_assignable(&existing, role, &person)?;
        self.store.insert_lead(&LeadAssignment { role, person })?;
        tracing::info!(role = %role, "lead assigned");
        Ok(())
    }

    /// Returns whether an assignment was removed.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::Store`] if the delete fails.
    pub fn remove(&self, role: Role, email: &str) -> Result<bool, LeadError> {
        let removed = self.store.delete_lead(role, email)?;
        if removed {
            tracing::info!(role = %role, "lead removed");
        }
        Ok(removed)
    }

    /// All assignments, optionally for one role.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::Store`] if the read fails.
    pub fn list(&self, role: Option<Role>) -> Result<Vec<LeadAssignment>, LeadError> {
        Ok(self.store.list_leads(role)?)
    }
}

impl LeadDirectory for StoreLeads<'_> {
    fn leads_for(&self, role: Role) -> Result<Vec<Person>, LeadError> {
        Ok(self
            .store
            .list_leads(Some(role))?
            .into_iter()
            .map(|assignment| assignment.person)
            .collect())
    }
}
