//! Pipeline roles: the four named participants of a case analysis.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four model personas the pipeline can call.
///
/// Role names cross the HTTP boundary as lowercase Portuguese identifiers;
/// anything else is rejected by [`FromStr`] rather than defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineRole {
    /// Report drafter: writes the technical report and the final consolidated report.
    Redator,
    /// Medical reviewer.
    Medico,
    /// Legal strategist.
    #[serde(alias = "estrategico")]
    Estrategista,
    /// Consolidator: produces the answer shown to the end user.
    Supervisor,
}

impl PipelineRole {
    pub const ALL: [PipelineRole; 4] = [
        PipelineRole::Redator,
        PipelineRole::Medico,
        PipelineRole::Estrategista,
        PipelineRole::Supervisor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineRole::Redator => "redator",
            PipelineRole::Medico => "medico",
            PipelineRole::Estrategista => "estrategista",
            PipelineRole::Supervisor => "supervisor",
        }
    }
}

impl fmt::Display for PipelineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role name is not one of the four known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown pipeline role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for PipelineRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redator" => Ok(PipelineRole::Redator),
            "medico" | "médico" => Ok(PipelineRole::Medico),
            "estrategista" | "estrategico" | "estratégico" => Ok(PipelineRole::Estrategista),
            "supervisor" => Ok(PipelineRole::Supervisor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
