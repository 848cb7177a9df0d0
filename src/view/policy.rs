use crate::error::ProjectionError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    ProjectManager,
    Engineer,
    VpEngineering,
    Customer,
}

impl std::fmt::Display for ViewerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerRole::ProjectManager => write!(f, "project_manager"),
            ViewerRole::Engineer => write!(f, "engineer"),
            ViewerRole::VpEngineering => write!(f, "vp_engineering"),
            ViewerRole::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for ViewerRole {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "project_manager" | "pm" => Ok(ViewerRole::ProjectManager),
            "engineer" => Ok(ViewerRole::Engineer),
            "vp_engineering" | "vp" => Ok(ViewerRole::VpEngineering),
            "customer" => Ok(ViewerRole::Customer),
            _ => Err(ProjectionError::UnknownRole(s.to_string())),
        }
    }
}

/// A part of the map a role may see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// The canonical rendered report, verbatim
    RenderedMap,
    ActionItems,
    Risks,
    Decisions,
    /// Counts-only synthesis of the map
    Summary,
    /// The reply to the sender as it would be delivered
    FinalResponse,
}

/// Something stripped from the sections a role sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redaction {
    /// Rationale and confidence score on decisions
    DecisionRationale,
    /// Reply wording meant for the sender
    CustomerWording,
    /// Individual action items
    LineLevelActionItems,
    /// Task and item ids, owner and deadline fields, owner names in text
    Internals,
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyRow {
    pub role: ViewerRole,
    pub sees: &'static [Section],
    pub redacts: &'static [Redaction],
}

/// Closed policy table. A new role gets a new row.
pub const POLICY: &[PolicyRow] = &[
    PolicyRow {
        role: ViewerRole::ProjectManager,
        sees: &[Section::RenderedMap],
        redacts: &[],
    },
    PolicyRow {
        role: ViewerRole::Engineer,
        sees: &[Section::ActionItems, Section::Risks],
        redacts: &[Redaction::DecisionRationale, Redaction::CustomerWording],
    },
    PolicyRow {
        role: ViewerRole::VpEngineering,
        sees: &[Section::Summary, Section::Risks, Section::Decisions],
        redacts: &[Redaction::LineLevelActionItems],
    },
    PolicyRow {
        role: ViewerRole::Customer,
        sees: &[Section::Summary, Section::FinalResponse],
        redacts: &[Redaction::Internals],
    },
];

/// Look up a role's row. A role without a row gets nothing.
pub fn policy_for(role: ViewerRole) -> Result<&'static PolicyRow, ProjectionError> {
    POLICY
        .iter()
        .find(|row| row.role == role)
        .ok_or_else(|| ProjectionError::UnknownRole(role.to_string()))
}
