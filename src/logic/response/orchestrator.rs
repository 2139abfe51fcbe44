//! Response Orchestrator
//!
//! Containment protocol: enumerate live targets, issue a kind-specific
//! termination command per target, poll liveness to verify, then re-enumerate
//! once and report anything still alive as remaining risk. Best-effort and
//! exhaustive: one failing target never short-circuits the rest, and the
//! caller always gets a complete per-target outcome map.

use std::time::Duration;

use super::backends::DeviceBackend;
use super::types::{ContainmentReport, Target, TerminationOutcome};

pub struct ResponseOrchestrator {
    backends: Vec<Box<dyn DeviceBackend>>,
    verify_interval: Duration,
}

impl ResponseOrchestrator {
    pub fn new(backends: Vec<Box<dyn DeviceBackend>>, verify_interval: Duration) -> Self {
        Self {
            backends,
            verify_interval,
        }
    }

    /// Run one containment episode over all currently live targets.
    ///
    /// Targets not present at enumeration time are out of scope for this
    /// episode. Never returns an error: failures are per-target records.
    pub fn contain(&self) -> ContainmentReport {
        let enumerated = self.enumerate_all();
        log::info!(
            "Containment episode over {} live target(s): [{}]",
            enumerated.len(),
            enumerated
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut outcomes = Vec::with_capacity(enumerated.len());
        for target in &enumerated {
            let outcome = self.terminate_and_verify(target);
            if outcome.verified {
                log::info!("Terminated and verified {}", target);
            } else {
                log::warn!(
                    "Failed to confirm termination of {} ({} polls, last error: {})",
                    target,
                    outcome.attempts,
                    outcome.last_error.as_deref().unwrap_or("none")
                );
            }
            outcomes.push((target.clone(), outcome));
        }

        // Race defense: a target may reappear, or verification may have
        // polled stale state. The final enumeration is authoritative.
        let remaining = self.enumerate_all();
        if remaining.is_empty() {
            log::info!("All targets terminated");
        } else {
            log::warn!(
                "{} target(s) still live after containment: [{}]",
                remaining.len(),
                remaining
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        ContainmentReport {
            enumerated,
            outcomes,
            remaining,
        }
    }

    /// Point-in-time union of live targets across all backends.
    /// A failing backend contributes nothing rather than aborting the query.
    pub fn enumerate_all(&self) -> Vec<Target> {
        let mut targets = Vec::new();
        for backend in &self.backends {
            match backend.enumerate() {
                Ok(found) => targets.extend(found),
                Err(e) => log::error!(
                    "Error enumerating {} targets: {}",
                    backend.kind().as_str(),
                    e
                ),
            }
        }
        targets
    }

    fn terminate_and_verify(&self, target: &Target) -> TerminationOutcome {
        let mut outcome = TerminationOutcome {
            attempted: true,
            ..Default::default()
        };

        let Some(backend) = self.backend_for(target) else {
            outcome.last_error = Some(format!("no backend for kind {}", target.kind.as_str()));
            return outcome;
        };

        if let Err(e) = backend.terminate(target) {
            log::error!("Error terminating {}: {}", target, e);
            outcome.last_error = Some(e.to_string());
            return outcome;
        }

        // Issue and verify are separate steps with independent budgets.
        for attempt in 1..=backend.verify_attempts() {
            std::thread::sleep(self.verify_interval);
            outcome.attempts = attempt;

            match backend.enumerate() {
                Ok(live) => {
                    if !live.contains(target) {
                        outcome.verified = true;
                        return outcome;
                    }
                }
                Err(e) => {
                    outcome.last_error = Some(e.to_string());
                }
            }
        }

        outcome
    }

    fn backend_for(&self, target: &Target) -> Option<&dyn DeviceBackend> {
        self.backends
            .iter()
            .map(|b| b.as_ref())
            .find(|b| b.kind() == target.kind)
    }
}

// ============================================================================
// TESTS
// ============================================================================
