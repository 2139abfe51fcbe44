//! Recorded-Stream Analysis
//!
//! On-demand counterpart to the live loop: walks a recorded stream once,
//! synchronously, sampling every Nth frame. Findings are aggregated across
//! the whole stream; if the aggregate is positive the same detect/react
//! pipeline fires exactly once, after the scan.

use serde::Serialize;

use crate::logic::capture::FrameSource;
use crate::logic::detection::Verdict;
use crate::logic::response::ContainmentReport;
use crate::logic::supervisor::{self, SharedState};

#[derive(Debug, Clone, Serialize)]
pub struct MediaAnalysis {
    pub verdict: Verdict,

    /// Present iff the verdict was positive and a containment episode ran
    pub containment: Option<ContainmentReport>,

    pub frames_scanned: u64,
    pub frames_sampled: u64,
}

#[derive(Debug)]
pub enum MediaError {
    /// A live session is running; live and on-demand analysis are mutually
    /// exclusive
    SessionActive,
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaError::SessionActive => write!(f, "a live monitoring session is active"),
        }
    }
}

impl std::error::Error for MediaError {}

pub(crate) fn analyze(
    shared: &SharedState,
    source: &mut dyn FrameSource,
) -> Result<MediaAnalysis, MediaError> {
    let stride = shared.config.frame_stride.max(1);
    let mut scanned: u64 = 0;
    let mut sampled: u64 = 0;
    let mut aggregate = Verdict::default();
    let mut first_flagged: Option<String> = None;

    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                // Transient decode failure ends the scan; findings gathered
                // so far still drive the reaction below.
                log::error!("Error reading recorded stream: {}", e);
                break;
            }
        };

        scanned += 1;
        if scanned % stride != 0 {
            continue;
        }
        sampled += 1;

        let verdict = shared.gateway.analyze(&frame);
        if verdict.is_positive() && first_flagged.is_none() {
            first_flagged = Some(frame.reference.display().to_string());
        }
        aggregate.merge(verdict);
    }

    log::info!(
        "Recorded stream scanned: {} frame(s), {} sampled, {} finding(s)",
        scanned,
        sampled,
        aggregate.findings.len()
    );

    let containment = if aggregate.is_positive() {
        let reference = first_flagged.unwrap_or_else(|| "<recorded stream>".to_string());
        if let Err(e) = shared.audit.record_detection(&reference, &aggregate) {
            log::error!("Error logging detection: {}", e);
        }
        supervisor::note(shared, "Problematic content detected; containment started");
        Some(supervisor::respond(shared, &reference, &aggregate))
    } else {
        None
    };

    Ok(MediaAnalysis {
        verdict: aggregate,
        containment,
        frames_scanned: scanned,
        frames_sampled: sampled,
    })
}
