//! Response Types

use serde::{Deserialize, Serialize};

// ============================================================================
// TARGETS
// ============================================================================

/// Family of controllable endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    AndroidEmulator,
    IosSimulator,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::AndroidEmulator => "android",
            TargetKind::IosSimulator => "ios",
        }
    }
}

/// An externally controllable endpoint subject to containment.
///
/// Liveness is derived, never stored: it is re-queried from the owning
/// backend every time it matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub id: String,
}

impl Target {
    pub fn new(kind: TargetKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Per-target record of one containment episode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminationOutcome {
    /// A termination command was issued (or attempted)
    pub attempted: bool,

    /// The target was observed absent within the verification budget
    pub verified: bool,

    /// Liveness polls performed during verification
    pub attempts: u32,

    pub last_error: Option<String>,
}

/// Complete picture of one containment episode.
///
/// Callers need the full per-target map, not a single boolean: the operator
/// report distinguishes attempted from verified for every target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainmentReport {
    /// Targets live at enumeration time, in enumeration order
    pub enumerated: Vec<Target>,

    /// One outcome per enumerated target, same order
    pub outcomes: Vec<(Target, TerminationOutcome)>,

    /// Targets still live after the final re-enumeration (remaining risk)
    pub remaining: Vec<Target>,
}

impl ContainmentReport {
    pub fn outcome_for(&self, id: &str) -> Option<&TerminationOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| t.id == id)
            .map(|(_, o)| o)
    }

    pub fn all_verified(&self) -> bool {
        self.remaining.is_empty() && self.outcomes.iter().all(|(_, o)| o.verified)
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlError {
    /// The control tool for this target kind is not installed on the host
    ToolUnavailable { tool: String },
    /// The control command ran and failed
    CommandFailed { command: String, detail: String },
    /// The control command exceeded its timeout
    Timeout { command: String },
    /// Other error
    Other { message: String },
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::ToolUnavailable { tool } => write!(f, "control tool unavailable: {}", tool),
            ControlError::CommandFailed { command, detail } => {
                write!(f, "command '{}' failed: {}", command, detail)
            }
            ControlError::Timeout { command } => write!(f, "command '{}' timed out", command),
            ControlError::Other { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ControlError {}
