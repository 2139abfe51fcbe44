//! Response - target containment and verification

pub mod backends;
pub mod orchestrator;
pub mod types;

pub use backends::{AdbBackend, DeviceBackend, SimctlBackend};
pub use orchestrator::ResponseOrchestrator;
pub use types::{ContainmentReport, ControlError, Target, TargetKind, TerminationOutcome};
