//! Eligibility rules: which templates a request's checklist contains.
//!
//! Selection is a pure function of the request's attributes. Running it twice
//! on the same request yields the same ordered list, which is what lets the
//! service re-run it to fill in items a failed batch left out.
//!
//! # Initial activation
//!
//! Most items start active iff their template has no prerequisites. The one
//! exception is the Inbound government credential: a Civilian or Military
//! employee who is not new to the organization already has installation
//! access, so the credential task is actionable at once even though it
//! nominally waits on installation in-processing (which is not selected for
//! them). That case carries `override_active = Some(true)`.

pub mod exit_reason;
mod inbound;
mod outbound;

use serde::{Deserialize, Serialize};

use crate::model::{Request, RequestType};
use crate::templates::TemplateId;

pub use exit_reason::{ExitCategory, ExitReason};
pub use inbound::select_inbound;
pub use outbound::select_outbound;

/// One template chosen for a request's checklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub template: TemplateId,
    /// Replaces the generic "active iff no prerequisites" rule when set.
    pub override_active: Option<bool>,
}

impl Selection {
    #[must_use]
    pub const fn new(template: TemplateId) -> Self {
        Self {
            template,
            override_active: None,
        }
    }

    #[must_use]
    pub const fn active(template: TemplateId) -> Self {
        Self {
            template,
            override_active: Some(true),
        }
    }
}

/// Select templates for `request`, dispatching on its type.
#[must_use]
pub fn select(request: &Request) -> Vec<Selection> {
    let selections = match request.request_type {
        RequestType::In => select_inbound(request),
        RequestType::Out => select_outbound(request),
    };
    tracing::debug!(
        request_id = %request.id,
        request_type = %request.request_type,
        selected = selections.len(),
        "selected checklist templates"
    );
    selections
}

/// Append `templates` without override when `condition` holds.
fn push_if(out: &mut Vec<Selection>, condition: bool, templates: &[TemplateId]) {
    if condition {
        out.extend(templates.iter().copied().map(Selection::new));
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use crate::model::{EmploymentType, NewRequest, Person, Request, RequestId, RequestType};

    pub fn request(request_type: RequestType, employment_type: EmploymentType) -> Request {
        Request::from_new(
            RequestId(1),
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
                work_location: crate::model::WorkLocation::Local,
                eta: None,
                exit_date: None,
            },
            Utc::now(),
        )
    }
}
