//! Supervisor Loop
//!
//! Owns the session state machine. On each tick the worker acquires a frame,
//! runs the detection gateway, and either keeps sampling (negative verdict,
//! interruptible inter-sample sleep) or reacts once (audit entry, containment
//! episode, operator notification) and halts. Cancellation is cooperative:
//! the stop signal is observed at loop-top and during the sleep, never
//! mid-step.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::audit::AuditLog;
use crate::logic::capture::{Frame, FrameSource};
use crate::logic::config::MonitorConfig;
use crate::logic::detection::{DetectionGateway, Verdict};
use crate::logic::notify::{IncidentReport, Notifier};
use crate::logic::response::{ContainmentReport, ResponseOrchestrator};

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        }
    }
}

/// One monitoring run. Exactly one session may be Running at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Option<String>,
    pub state: SessionState,
    pub started_at: Option<DateTime<Utc>>,
    pub frame_counter: u64,
}

impl Session {
    pub fn idle() -> Self {
        Self {
            id: None,
            state: SessionState::Idle,
            started_at: None,
            frame_counter: 0,
        }
    }

    pub fn begin() -> Self {
        Self {
            id: Some(Uuid::new_v4().to_string()),
            state: SessionState::Running,
            started_at: Some(Utc::now()),
            frame_counter: 0,
        }
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cooperative stop signal with an interruptible wait.
///
/// The inter-sample sleep is a timed condvar wait, not a blind delay, so
/// stop latency is bounded by one tick plus a small constant.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock() = true;
        cvar.notify_all();
    }

    /// Lower a stale signal before a fresh session
    pub fn clear(&self) {
        *self.inner.0.lock() = false;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep up to `timeout`; returns true if cancelled before or during
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let mut cancelled = flag.lock();
        if *cancelled {
            return true;
        }
        cvar.wait_for(&mut cancelled, timeout);
        *cancelled
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SHARED STATE
// ============================================================================

/// Everything the worker and the front end share. The session mutex and the
/// cancel flag are the only concurrently mutated values.
pub(crate) struct SharedState {
    pub config: MonitorConfig,
    pub session: Mutex<Session>,
    pub cancel: CancelToken,
    pub source: Mutex<Box<dyn FrameSource>>,
    pub gateway: DetectionGateway,
    pub orchestrator: ResponseOrchestrator,
    pub audit: AuditLog,
    pub notifier: Box<dyn Notifier>,
}

// ============================================================================
// WORKER LOOP
// ============================================================================

pub(crate) fn run(shared: Arc<SharedState>) {
    let session_id = shared
        .session
        .lock()
        .id
        .clone()
        .unwrap_or_else(|| "?".to_string());
    log::info!("Monitoring session {} started", session_id);

    loop {
        if shared.cancel.is_cancelled() {
            log::info!("Cancellation observed, session {} winding down", session_id);
            break;
        }

        let frame = match shared.source.lock().next_frame() {
            Ok(Some(frame)) => Some(frame),
            Ok(None) => {
                log::info!("Frame source exhausted, session {} ends", session_id);
                break;
            }
            Err(e) => {
                // Transient acquisition failure counts as a negative tick
                log::error!("Error acquiring frame: {}", e);
                None
            }
        };

        if let Some(frame) = frame {
            let verdict = shared.gateway.analyze(&frame);
            if verdict.is_positive() {
                shared.session.lock().state = SessionState::Stopping;
                react(&shared, &frame, &verdict);
                break;
            }
            shared.session.lock().frame_counter += 1;
        }

        if shared.cancel.wait_for(shared.config.capture_interval) {
            log::info!("Cancellation observed during sleep, session {} winding down", session_id);
            break;
        }
    }

    shared.session.lock().state = SessionState::Stopped;
    log::info!("Monitoring session {} stopped", session_id);
}

/// The single reaction of a session: audit, contain, notify
fn react(shared: &SharedState, frame: &Frame, verdict: &Verdict) {
    log::warn!("Problematic content detected, starting containment");
    let reference = frame.reference.display().to_string();

    if let Err(e) = shared.audit.record_detection(&reference, verdict) {
        log::error!("Error logging detection: {}", e);
    }
    note(shared, "Problematic content detected; containment started");

    let containment = respond(shared, &reference, verdict);

    if !containment.remaining.is_empty() {
        note(
            shared,
            &format!(
                "{} target(s) still running after containment attempt",
                containment.remaining.len()
            ),
        );
    }
}

/// Containment plus notification, shared by the live loop and on-demand
/// media analysis. Nothing here is fatal; failures end up in the logs and
/// in the report itself.
pub(crate) fn respond(
    shared: &SharedState,
    image_reference: &str,
    verdict: &Verdict,
) -> ContainmentReport {
    let containment = shared.orchestrator.contain();

    let report = IncidentReport::new(image_reference, verdict, &containment);
    match shared.notifier.send(&report) {
        Ok(()) => note(shared, &format!("Report sent: {}", report.subject)),
        Err(e) => {
            log::error!("Error sending report: {}", e);
            note(
                shared,
                &format!("Failed to send report: {}. Error: {}", report.subject, e),
            );
        }
    }

    containment
}

/// Best-effort message-log breadcrumb
pub(crate) fn note(shared: &SharedState, message: &str) {
    if let Err(e) = shared.audit.record_message(message) {
        log::error!("Error logging message: {}", e);
    }
}

// ============================================================================
// TESTS
// ============================================================================
