use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ParseEnumError, Person, RequestId, normalize};
use crate::rules::exit_reason::ExitReason;

/// Onboarding (`In`) or offboarding (`Out`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    In,
    Out,
}

impl RequestType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "In",
            Self::Out => "Out",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmploymentType {
    Civilian,
    Military,
    Contractor,
}

impl EmploymentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Civilian => "Civilian",
            Self::Military => "Military",
            Self::Contractor => "Contractor",
        }
    }

    /// Civilian and Military share most government-employee tasks.
    #[must_use]
    pub const fn is_government(self) -> bool {
        matches!(self, Self::Civilian | Self::Military)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkLocation {
    #[default]
    Local,
    Remote,
}

impl WorkLocation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Active,
    Cancelled,
    Closed,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Cancelled => "Cancelled",
            Self::Closed => "Closed",
        }
    }

    /// Validate whether a transition from self to `target` is allowed.
    ///
    /// Valid transitions:
    /// - `Active -> Cancelled`
    /// - `Active -> Closed`
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStatusTransition`] for every other pair, including
    /// no-op transitions.
    pub fn can_transition_to(self, target: Self) -> Result<(), InvalidStatusTransition> {
        if self == target {
            return Err(InvalidStatusTransition {
                from: self,
                to: target,
                reason: "no-op transition is not allowed",
            });
        }

        if matches!(
            (self, target),
            (Self::Active, Self::Cancelled) | (Self::Active, Self::Closed)
        ) {
            Ok(())
        } else {
            Err(InvalidStatusTransition {
                from: self,
                to: target,
                reason: "cancelled and closed requests are final",
            })
        }
    }
}

/// Error returned when a request status transition is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidStatusTransition {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub reason: &'static str,
}

impl fmt::Display for InvalidStatusTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move request from {} to {}: {}", self.from, self.to, self.reason)
    }
}

impl std::error::Error for InvalidStatusTransition {}

macro_rules! display_via_as_str {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

display_via_as_str!(RequestType, EmploymentType, WorkLocation, RequestStatus);

impl FromStr for RequestType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "in" | "inbound" => Ok(Self::In),
            "out" | "outbound" => Ok(Self::Out),
            _ => Err(ParseEnumError {
                expected: "request type",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for EmploymentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "civilian" => Ok(Self::Civilian),
            "military" => Ok(Self::Military),
            "contractor" => Ok(Self::Contractor),
            _ => Err(ParseEnumError {
                expected: "employment type",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for WorkLocation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(ParseEnumError {
                expected: "work location",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for RequestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "closed" => Ok(Self::Closed),
            _ => Err(ParseEnumError {
                expected: "request status",
                got: s.to_string(),
            }),
        }
    }
}

/// Form data captured on submission, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRequest {
    pub request_type: RequestType,
    pub employee_name: String,
    /// Unknown for most new hires until their account exists.
    #[serde(default)]
    pub employee: Option<Person>,
    pub employment_type: EmploymentType,
    pub supervisor: Person,
    #[serde(default)]
    pub is_new_to_org: bool,
    #[serde(default)]
    pub is_supervisor: bool,
    #[serde(default)]
    pub is_traveler: bool,
    #[serde(default)]
    pub has_sci: bool,
    #[serde(default)]
    pub has_sipr: bool,
    #[serde(default)]
    pub exit_reason: Option<ExitReason>,
    #[serde(default)]
    pub sensitivity_code: Option<u8>,
    #[serde(default)]
    pub access_code: Option<u8>,
    #[serde(default)]
    pub office_symbol: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub grade_rank: Option<String>,
    #[serde(default)]
    pub work_location: WorkLocation,
    #[serde(default)]
    pub eta: Option<NaiveDate>,
    #[serde(default)]
    pub exit_date: Option<NaiveDate>,
}

/// Field-level validation failure on submitted form data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestValidationError {
    pub field: &'static str,
    pub reason: &'static str,
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for RequestValidationError {}

impl NewRequest {
    /// Minimal structural checks; form-level validation belongs to the UI.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.employee_name.trim().is_empty() {
            return Err(RequestValidationError {
                field: "employee_name",
                reason: "must not be empty",
            });
        }
        if self.supervisor.email.trim().is_empty() {
            return Err(RequestValidationError {
                field: "supervisor.email",
                reason: "must not be empty",
            });
        }
        if self.request_type == RequestType::Out && self.exit_reason.is_none() {
            return Err(RequestValidationError {
                field: "exit_reason",
                reason: "required for out-processing",
            });
        }
        if self.request_type == RequestType::In && self.exit_reason.is_some() {
            return Err(RequestValidationError {
                field: "exit_reason",
                reason: "only valid for out-processing",
            });
        }
        Ok(())
    }
}

/// A persisted in/out-processing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub request_type: RequestType,
    pub employee_name: String,
    pub employee: Option<Person>,
    pub employment_type: EmploymentType,
    pub supervisor: Person,
    pub status: RequestStatus,
    pub is_new_to_org: bool,
    pub is_supervisor: bool,
    pub is_traveler: bool,
    pub has_sci: bool,
    pub has_sipr: bool,
    pub exit_reason: Option<ExitReason>,
    pub sensitivity_code: Option<u8>,
    pub access_code: Option<u8>,
    pub office_symbol: String,
    pub position: Option<String>,
    pub grade_rank: Option<String>,
    pub work_location: WorkLocation,
    pub eta: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub cancel_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Request {
    /// Build the stored form of a submission. Used by store implementations
    /// once they have assigned an id.
    #[must_use]
    pub fn from_new(id: RequestId, new: NewRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            request_type: new.request_type,
            employee_name: new.employee_name,
            employee: new.employee,
            employment_type: new.employment_type,
            supervisor: new.supervisor,
            status: RequestStatus::Active,
            is_new_to_org: new.is_new_to_org,
            is_supervisor: new.is_supervisor,
            is_traveler: new.is_traveler,
            has_sci: new.has_sci,
            has_sipr: new.has_sipr,
            exit_reason: new.exit_reason,
            sensitivity_code: new.sensitivity_code,
            access_code: new.access_code,
            office_symbol: new.office_symbol,
            position: new.position,
            grade_rank: new.grade_rank,
            work_location: new.work_location,
            eta: new.eta,
            exit_date: new.exit_date,
            cancel_reason: None,
            closed_at: None,
            created_at,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RequestStatus::Active
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: RequestPatch) {
        if let Some(name) = patch.employee_name {
            self.employee_name = name;
        }
        if let Some(employee) = patch.employee {
            self.employee = Some(employee);
        }
        if let Some(supervisor) = patch.supervisor {
            self.supervisor = supervisor;
        }
        if let Some(office) = patch.office_symbol {
            self.office_symbol = office;
        }
        if let Some(position) = patch.position {
            self.position = Some(position);
        }
        if let Some(grade) = patch.grade_rank {
            self.grade_rank = Some(grade);
        }
        if let Some(location) = patch.work_location {
            self.work_location = location;
        }
        if let Some(eta) = patch.eta {
            self.eta = Some(eta);
        }
        if let Some(exit_date) = patch.exit_date {
            self.exit_date = Some(exit_date);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(reason) = patch.cancel_reason {
            self.cancel_reason = Some(reason);
        }
        if let Some(closed_at) = patch.closed_at {
            self.closed_at = Some(closed_at);
        }
    }
}

/// Partial update of a request. `None` fields are left untouched.
///
/// Eligibility attributes are deliberately absent: the checklist is derived
/// from them once, at submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestPatch {
    pub employee_name: Option<String>,
    pub employee: Option<Person>,
    pub supervisor: Option<Person>,
    pub office_symbol: Option<String>,
    pub position: Option<String>,
    pub grade_rank: Option<String>,
    pub work_location: Option<WorkLocation>,
    pub eta: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub status: Option<RequestStatus>,
    pub cancel_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl RequestPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new(request_type: RequestType) -> NewRequest {
        NewRequest {
            request_type,
            employee_name: "Pat Doe".to_string(),
            employee: None,
            employment_type: EmploymentType::Civilian,
            supervisor: Person::new("Sam Lead", "sam.lead@example.mil"),
            is_new_to_org: true,
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
            work_location: WorkLocation::Local,
            eta: None,
            exit_date: None,
        }
    }

    #[test]
    fn status_transition_rules() {
        assert!(RequestStatus::Active.can_transition_to(RequestStatus::Cancelled).is_ok());
        assert!(RequestStatus::Active.can_transition_to(RequestStatus::Closed).is_ok());
        assert!(RequestStatus::Active.can_transition_to(RequestStatus::Active).is_err());
        assert!(matches!(
            RequestStatus::Cancelled.can_transition_to(RequestStatus::Active),
            Err(InvalidStatusTransition {
                from: RequestStatus::Cancelled,
                to: RequestStatus::Active,
                ..
            })
        ));
        assert!(RequestStatus::Closed.can_transition_to(RequestStatus::Cancelled).is_err());
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!(RequestType::from_str("inbound").unwrap(), RequestType::In);
        assert_eq!(RequestType::from_str("OUT").unwrap(), RequestType::Out);
        assert_eq!(
            EmploymentType::from_str(" contractor ").unwrap(),
            EmploymentType::Contractor
        );
        assert_eq!(RequestStatus::from_str("closed").unwrap(), RequestStatus::Closed);
        assert!(EmploymentType::from_str("intern").is_err());
    }

    #[test]
    fn outbound_requires_exit_reason() {
        let new = sample_new(RequestType::Out);
        let err = new.validate().unwrap_err();
        assert_eq!(err.field, "exit_reason");
    }

    #[test]
    fn inbound_rejects_exit_reason_and_blank_names() {
        let mut new = sample_new(RequestType::In);
        assert!(new.validate().is_ok());

        new.exit_reason = Some(ExitReason::Retirement);
        assert_eq!(new.validate().unwrap_err().field, "exit_reason");

        let mut blank = sample_new(RequestType::In);
        blank.employee_name = "   ".to_string();
        assert_eq!(blank.validate().unwrap_err().field, "employee_name");
    }

    #[test]
    fn minimal_json_submission_uses_defaults() {
        let json = r#"{
            "request_type": "In",
            "employee_name": "Pat Doe",
            "employment_type": "Contractor",
            "supervisor": {"name": "Sam Lead", "email": "sam.lead@example.mil"}
        }"#;
        let new: NewRequest = serde_json::from_str(json).unwrap();
        assert!(!new.is_new_to_org);
        assert!(new.employee.is_none());
        assert_eq!(new.work_location, WorkLocation::Local);
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let created = Utc::now();
        let mut request = Request::from_new(RequestId(7), sample_new(RequestType::In), created);
        assert!(request.is_active());

        request.apply(RequestPatch {
            office_symbol: Some("XPZ".to_string()),
            employee: Some(Person::new("Pat Doe", "pat.doe@example.mil")),
            ..RequestPatch::default()
        });

        assert_eq!(request.office_symbol, "XPZ");
        assert_eq!(request.employee_name, "Pat Doe");
        assert_eq!(
            request.employee.as_ref().map(|p| p.email.as_str()),
            Some("pat.doe@example.mil")
        );
        assert_eq!(request.created_at, created);
        assert!(RequestPatch::default().is_empty());
    }
}
