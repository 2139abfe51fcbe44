//! Operator Notification
//!
//! Builds the human-readable incident report (verdict plus the full
//! per-target containment picture) and delivers it through a `Notifier`.
//! Delivery failure is a transient I/O failure: logged and recorded, never
//! fatal to the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::detection::Verdict;
use crate::logic::response::ContainmentReport;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentReport {
    pub subject: String,
    pub body: String,
    pub hostname: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub verdict: Verdict,
    pub containment: ContainmentReport,
}

impl IncidentReport {
    pub fn new(image_reference: &str, verdict: &Verdict, containment: &ContainmentReport) -> Self {
        let mut body = String::new();
        body.push_str(&format!(
            "Policy-violating content was detected in: {}\n\nDetected content: {}\n\n",
            image_reference,
            verdict.summary()
        ));

        body.push_str(&format!(
            "Targets at detection time: {}\n",
            list(&containment.enumerated)
        ));
        for (target, outcome) in &containment.outcomes {
            body.push_str(&format!(
                "  {} - attempted: {}, verified: {}, polls: {}{}\n",
                target,
                outcome.attempted,
                outcome.verified,
                outcome.attempts,
                outcome
                    .last_error
                    .as_deref()
                    .map(|e| format!(", last error: {}", e))
                    .unwrap_or_default()
            ));
        }
        body.push_str(&format!(
            "Targets remaining after containment: {}\n",
            list(&containment.remaining)
        ));

        Self {
            subject: "Policy-Violating Content Detected".to_string(),
            body,
            hostname: hostname::get().ok().map(|h| h.to_string_lossy().to_string()),
            timestamp: Utc::now(),
            verdict: verdict.clone(),
            containment: containment.clone(),
        }
    }
}

fn list(targets: &[crate::logic::response::Target]) -> String {
    if targets.is_empty() {
        "none".to_string()
    } else {
        targets
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================================
// NOTIFIER CAPABILITY
// ============================================================================

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotifyError: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

pub trait Notifier: Send + Sync {
    fn send(&self, report: &IncidentReport) -> Result<(), NotifyError>;
}

/// Posts the report as JSON to an operator webhook
pub struct WebhookNotifier {
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, report: &IncidentReport) -> Result<(), NotifyError> {
        let payload = serde_json::to_value(report)
            .map_err(|e| NotifyError(format!("serialize report: {}", e)))?;

        ureq::post(&self.url)
            .send_json(payload)
            .map_err(|e| NotifyError(format!("webhook POST: {}", e)))?;

        log::info!("Report sent: {}", report.subject);
        Ok(())
    }
}

/// Fallback when no webhook is configured: the report only reaches the logs
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, report: &IncidentReport) -> Result<(), NotifyError> {
        log::warn!("{}\n{}", report.subject, report.body);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
