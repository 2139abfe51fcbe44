//! Screen Sentinel
//!
//! Watches a visual stream, classifies sampled frames for policy-violating
//! content, and on first positive detection terminates controllable target
//! devices, notifies an operator, and keeps an auditable history.

pub mod constants;
pub mod logic;

pub use logic::audit::{AuditLog, DetectionRecord, MessageRecord};
pub use logic::capture::{CommandFrameSource, Frame, FrameSource};
pub use logic::config::MonitorConfig;
pub use logic::detection::{
    Classifier, ClassifierProfile, CommandClassifier, DetectionGateway, Finding, RawDetection,
    Verdict,
};
pub use logic::lifecycle::{Monitor, StatusSnapshot};
pub use logic::media::{MediaAnalysis, MediaError};
pub use logic::notify::{IncidentReport, LogNotifier, Notifier, WebhookNotifier};
pub use logic::response::{
    AdbBackend, ContainmentReport, DeviceBackend, ResponseOrchestrator, SimctlBackend, Target,
    TargetKind, TerminationOutcome,
};
pub use logic::supervisor::SessionState;
