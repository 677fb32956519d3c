//! Exit reasons and their category grouping.
//!
//! Categories are a static partition of the reasons. Membership is a
//! containment test against the category's reason list, so adding a reason
//! means adding it to exactly one group below.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::model::{ParseEnumError, normalize};

/// Why an employee is out-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    ReassignmentWithinOrg,
    PermanentChangeOfStation,
    MoveWithinAf,
    MoveToNonAfDod,
    MoveToFederalAgency,
    Resignation,
    Termination,
    EndOfContract,
    MilitarySeparation,
    Retirement,
    DisabilityRetirement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitCategory {
    Transferring,
    Separating,
    Retiring,
}

/// Reason grouping. Each reason appears in exactly one category.
pub const EXIT_REASON_GROUPS: &[(ExitCategory, &[ExitReason])] = &[
    (
        ExitCategory::Transferring,
        &[
            ExitReason::ReassignmentWithinOrg,
            ExitReason::PermanentChangeOfStation,
            ExitReason::MoveWithinAf,
        ],
    ),
    (
        ExitCategory::Separating,
        &[
            ExitReason::MoveToNonAfDod,
            ExitReason::MoveToFederalAgency,
            ExitReason::Resignation,
            ExitReason::Termination,
            ExitReason::EndOfContract,
            ExitReason::MilitarySeparation,
        ],
    ),
    (
        ExitCategory::Retiring,
        &[ExitReason::Retirement, ExitReason::DisabilityRetirement],
    ),
];

impl ExitReason {
    pub const ALL: [Self; 11] = [
        Self::ReassignmentWithinOrg,
        Self::PermanentChangeOfStation,
        Self::MoveWithinAf,
        Self::MoveToNonAfDod,
        Self::MoveToFederalAgency,
        Self::Resignation,
        Self::Termination,
        Self::EndOfContract,
        Self::MilitarySeparation,
        Self::Retirement,
        Self::DisabilityRetirement,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReassignmentWithinOrg => "reassignment_within_org",
            Self::PermanentChangeOfStation => "permanent_change_of_station",
            Self::MoveWithinAf => "move_within_af",
            Self::MoveToNonAfDod => "move_to_non_af_dod",
            Self::MoveToFederalAgency => "move_to_federal_agency",
            Self::Resignation => "resignation",
            Self::Termination => "termination",
            Self::EndOfContract => "end_of_contract",
            Self::MilitarySeparation => "military_separation",
            Self::Retirement => "retirement",
            Self::DisabilityRetirement => "disability_retirement",
        }
    }

    /// Human label shown on forms and in emails.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ReassignmentWithinOrg => "Reassignment within the organization",
            Self::PermanentChangeOfStation => "Permanent change of station",
            Self::MoveWithinAf => "Move to another AF organization",
            Self::MoveToNonAfDod => "Move to a non-AF DoD organization",
            Self::MoveToFederalAgency => "Move to a non-DoD federal agency",
            Self::Resignation => "Resignation",
            Self::Termination => "Termination",
            Self::EndOfContract => "End of contract",
            Self::MilitarySeparation => "Military separation",
            Self::Retirement => "Retirement",
            Self::DisabilityRetirement => "Disability retirement",
        }
    }

    #[must_use]
    pub fn category(self) -> Option<ExitCategory> {
        category_of(self)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        Self::ALL
            .into_iter()
            .find(|reason| reason.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                expected: "exit reason",
                got: s.to_string(),
            })
    }
}

/// Category containing `reason`, per [`EXIT_REASON_GROUPS`].
#[must_use]
pub fn category_of(reason: ExitReason) -> Option<ExitCategory> {
    EXIT_REASON_GROUPS
        .iter()
        .find(|(_, reasons)| reasons.contains(&reason))
        .map(|(category, _)| *category)
}

/// `true` if `reason` belongs to any of `categories`. A missing reason
/// belongs to none.
#[must_use]
pub fn is_in_category(reason: Option<ExitReason>, categories: &[ExitCategory]) -> bool {
    reason
        .and_then(category_of)
        .is_some_and(|category| categories.contains(&category))
}
