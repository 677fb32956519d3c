use std::fmt;

use crate::model::request::RequestValidationError;
use crate::model::{InvalidTransition, ItemId, RequestId, RequestStatus};
use crate::store::{RecordKind, StoreError};

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    CatalogInvalid,
    RequestNotFound,
    ItemNotFound,
    InvalidStateTransition,
    RequestNotActive,
    InvalidEnumValue,
    ValidationFailed,
    DuplicateLeadAssignment,
    VersionConflict,
    StoreUnavailable,
    StoreBackendFailure,
    DeliveryFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::CatalogInvalid => "E1002",
            Self::RequestNotFound => "E2001",
            Self::ItemNotFound => "E2002",
            Self::InvalidStateTransition => "E2003",
            Self::RequestNotActive => "E2004",
            Self::InvalidEnumValue => "E2005",
            Self::ValidationFailed => "E2006",
            Self::DuplicateLeadAssignment => "E2007",
            Self::VersionConflict => "E3001",
            Self::StoreUnavailable => "E5001",
            Self::StoreBackendFailure => "E5002",
            Self::DeliveryFailed => "E6001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::CatalogInvalid => "Template catalog is invalid",
            Self::RequestNotFound => "Request not found",
            Self::ItemNotFound => "Checklist item not found",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::RequestNotActive => "Request is no longer active",
            Self::InvalidEnumValue => "Invalid enum value",
            Self::ValidationFailed => "Request data failed validation",
            Self::DuplicateLeadAssignment => "Lead already assigned to role",
            Self::VersionConflict => "Item changed concurrently",
            Self::StoreUnavailable => "Record store unavailable",
            Self::StoreBackendFailure => "Record store operation failed",
            Self::DeliveryFailed => "Email delivery failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in passage.toml and retry."),
            Self::CatalogInvalid => Some("The embedded catalog is broken; rebuild from a clean tree."),
            Self::RequestNotFound | Self::ItemNotFound => None,
            Self::InvalidStateTransition => Some(
                "Items move inactive -> active -> completed; only a completed item can be reactivated.",
            ),
            Self::RequestNotActive => Some("Cancelled and closed requests cannot be changed."),
            Self::InvalidEnumValue => Some("Use one of the documented values."),
            Self::ValidationFailed => Some("Correct the named field and resubmit."),
            Self::DuplicateLeadAssignment => None,
            Self::VersionConflict => Some("Reload the checklist and retry the action."),
            Self::StoreUnavailable => Some("Retry once the store is reachable; the form data is kept."),
            Self::StoreBackendFailure => Some("Retry the named operation. If persistent, check store logs."),
            Self::DeliveryFailed => Some("Task state was saved; resend the notification manually."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The store call that failed, so a caller can offer a scoped retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateRequest,
    UpdateRequest,
    LoadRequest,
    CreateChecklist,
    LoadChecklist,
    LoadItem,
    CompleteItem,
    ActivateItem,
    ReactivateItem,
    ManageLeads,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateRequest => "create request",
            Self::UpdateRequest => "update request",
            Self::LoadRequest => "load request",
            Self::CreateChecklist => "create checklist",
            Self::LoadChecklist => "load checklist",
            Self::LoadItem => "load checklist item",
            Self::CompleteItem => "complete checklist item",
            Self::ActivateItem => "activate checklist item",
            Self::ReactivateItem => "reactivate checklist item",
            Self::ManageLeads => "manage lead assignments",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record-store failure tagged with the operation that hit it.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {cause}")]
pub struct ApiError {
    pub operation: Operation,
    #[source]
    pub cause: StoreError,
}

impl ApiError {
    #[must_use]
    pub const fn new(operation: Operation, cause: StoreError) -> Self {
        Self { operation, cause }
    }

    /// Adapter for `map_err`.
    pub fn during(operation: Operation) -> impl FnOnce(StoreError) -> Self {
        move |cause| Self::new(operation, cause)
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match &self.cause {
            StoreError::NotFound {
                kind: RecordKind::Request,
                ..
            } => ErrorCode::RequestNotFound,
            StoreError::NotFound { .. } => ErrorCode::ItemNotFound,
            StoreError::Conflict { .. } => ErrorCode::VersionConflict,
            StoreError::StatusChanged { .. } => ErrorCode::RequestNotActive,
            StoreError::Backend(_) => ErrorCode::StoreBackendFailure,
            StoreError::Unavailable(_) => ErrorCode::StoreUnavailable,
        }
    }
}

/// Failure of a request-level action.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("item {item}: {source}")]
    InvalidTransition {
        item: ItemId,
        #[source]
        source: InvalidTransition,
    },

    #[error("request {request} is {status}, not active")]
    RequestNotActive {
        request: RequestId,
        status: RequestStatus,
    },

    #[error(transparent)]
    Validation(#[from] RequestValidationError),

    /// The request was stored but creating its checklist failed outright.
    /// Retry with the request id; the form data is already saved.
    #[error("request {request} was saved but its checklist was not: {source}")]
    ChecklistNotCreated {
        request: RequestId,
        #[source]
        source: ApiError,
    },
}

impl ProcessingError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Api(err) => err.code(),
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::RequestNotActive { .. } => ErrorCode::RequestNotActive,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::ChecklistNotCreated { source, .. } => source.code(),
        }
    }

    /// `true` when another writer changed the item first.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError {
                cause: StoreError::Conflict { .. },
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemState;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::CatalogInvalid,
            ErrorCode::RequestNotFound,
            ErrorCode::ItemNotFound,
            ErrorCode::InvalidStateTransition,
            ErrorCode::RequestNotActive,
            ErrorCode::InvalidEnumValue,
            ErrorCode::ValidationFailed,
            ErrorCode::DuplicateLeadAssignment,
            ErrorCode::VersionConflict,
            ErrorCode::StoreUnavailable,
            ErrorCode::StoreBackendFailure,
            ErrorCode::DeliveryFailed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::VersionConflict.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn api_error_names_the_operation() {
        let err = ApiError::new(
            Operation::CreateChecklist,
            StoreError::Unavailable("connection refused".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "create checklist failed: store unavailable: connection refused"
        );
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn processing_error_codes() {
        let conflict = ProcessingError::from(ApiError::new(
            Operation::CompleteItem,
            StoreError::Conflict {
                item: ItemId(1),
                expected: 1,
                actual: 2,
            },
        ));
        assert!(conflict.is_conflict());
        assert_eq!(conflict.code(), ErrorCode::VersionConflict);

        let raced = ApiError::new(
            Operation::UpdateRequest,
            StoreError::StatusChanged {
                request: RequestId(9),
                status: RequestStatus::Closed,
            },
        );
        assert_eq!(raced.code(), ErrorCode::RequestNotActive);
        assert_eq!(
            raced.to_string(),
            "update request failed: request 9 is already Closed"
        );

        let transition = ProcessingError::InvalidTransition {
            item: ItemId(4),
            source: InvalidTransition {
                from: ItemState::Inactive,
                to: ItemState::Completed,
                reason: "blocked",
            },
        };
        assert_eq!(transition.code(), ErrorCode::InvalidStateTransition);
        assert!(transition.to_string().starts_with("item 4: cannot move item"));

        let pending = ProcessingError::ChecklistNotCreated {
            request: RequestId(9),
            source: ApiError::new(
                Operation::CreateChecklist,
                StoreError::Unavailable("timeout".to_string()),
            ),
        };
        assert_eq!(pending.code(), ErrorCode::StoreUnavailable);
        assert!(pending.to_string().starts_with("request 9 was saved"));
    }
}
