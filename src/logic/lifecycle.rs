//! Lifecycle Control
//!
//! Thin start/stop/status surface over the supervisor worker, plus the
//! on-demand boundary operations. Guarantees: at most one worker thread at
//! any time, `start` while running and `stop` while idle are safe observable
//! no-ops, and `stop` waits a bounded time for worker exit.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::logic::audit::{AuditError, AuditLog, DetectionRecord, MessageRecord};
use crate::logic::capture::FrameSource;
use crate::logic::config::MonitorConfig;
use crate::logic::detection::DetectionGateway;
use crate::logic::media::{self, MediaAnalysis, MediaError};
use crate::logic::notify::Notifier;
use crate::logic::response::ResponseOrchestrator;
use crate::logic::supervisor::{self, CancelToken, Session, SessionState, SharedState};

/// Non-blocking view of the current session
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub state: SessionState,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub frame_counter: u64,
}

// ============================================================================
// MONITOR
// ============================================================================

pub struct Monitor {
    shared: Arc<SharedState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        source: Box<dyn FrameSource>,
        gateway: DetectionGateway,
        orchestrator: ResponseOrchestrator,
        audit: AuditLog,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            shared: Arc::new(SharedState {
                config,
                session: Mutex::new(Session::idle()),
                cancel: CancelToken::new(),
                source: Mutex::new(source),
                gateway,
                orchestrator,
                audit,
                notifier,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start a monitoring session. No-op (returns false) if one is already
    /// running or still winding down.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();

        {
            let session = self.shared.session.lock();
            match session.state {
                SessionState::Running | SessionState::Stopping => {
                    log::info!("start ignored: session already {}", session.state.as_str());
                    return false;
                }
                SessionState::Idle | SessionState::Stopped => {}
            }
        }

        // Reap the previous worker, if any; its session is Stopped so the
        // thread is gone or about to be.
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }

        self.shared.cancel.clear();
        if let Err(e) = self.shared.source.lock().reset() {
            log::warn!("Error resetting frame source: {}", e);
        }

        *self.shared.session.lock() = Session::begin();

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("sentinel-supervisor".to_string())
            .spawn(move || supervisor::run(shared));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                log::info!("Monitoring started");
                true
            }
            Err(e) => {
                log::error!("Failed to spawn supervisor worker: {}", e);
                self.shared.session.lock().state = SessionState::Stopped;
                false
            }
        }
    }

    /// Stop the running session. No-op (returns false) if nothing runs.
    /// Waits up to the configured stop timeout for the worker to exit; on
    /// timeout the cancel signal stays raised so the worker still stops at
    /// its next checkpoint.
    pub fn stop(&self) -> bool {
        {
            let mut session = self.shared.session.lock();
            match session.state {
                SessionState::Running => session.state = SessionState::Stopping,
                SessionState::Stopping => {}
                SessionState::Idle | SessionState::Stopped => {
                    log::info!("stop ignored: no session running");
                    return false;
                }
            }
        }

        self.shared.cancel.cancel();

        let mut worker = self.worker.lock();
        if let Some(handle) = worker.take() {
            let deadline = Instant::now() + self.shared.config.stop_timeout;
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    log::warn!(
                        "Worker did not exit within {:?}; cancellation stays raised",
                        self.shared.config.stop_timeout
                    );
                    *worker = Some(handle);
                    return true;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            let _ = handle.join();
        }

        log::info!("Monitoring stopped");
        true
    }

    /// Current session snapshot; never blocks on the worker
    pub fn status(&self) -> StatusSnapshot {
        let session = self.shared.session.lock();
        StatusSnapshot {
            running: session.state == SessionState::Running,
            state: session.state,
            session_id: session.id.clone(),
            started_at: session.started_at,
            frame_counter: session.frame_counter,
        }
    }

    /// Analyze a recorded stream once, synchronously. Mutually exclusive
    /// with a live session.
    pub fn analyze_media(&self, source: &mut dyn FrameSource) -> Result<MediaAnalysis, MediaError> {
        {
            let session = self.shared.session.lock();
            if session.state == SessionState::Running || session.state == SessionState::Stopping {
                return Err(MediaError::SessionActive);
            }
        }
        media::analyze(&self.shared, source)
    }

    /// Accumulated detection entries, oldest first
    pub fn detections(&self) -> Result<Vec<DetectionRecord>, AuditError> {
        self.shared.audit.detections()
    }

    /// Accumulated message entries, oldest first
    pub fn messages(&self) -> Result<Vec<MessageRecord>, AuditError> {
        self.shared.audit.messages()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::capture::{CaptureError, Frame};
    use crate::logic::detection::{
        Classifier, ClassifierError, ClassifierProfile, RawDetection,
    };
    use crate::logic::notify::{IncidentReport, NotifyError};
    use crate::logic::response::{ControlError, DeviceBackend, Target, TargetKind};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;

    /// Yields numbered frames; finite when `limit` is set
    struct ScriptedSource {
        next: u64,
        limit: Option<u64>,
        fail_at: Option<u64>,
        produced: Arc<AtomicU64>,
    }

    impl ScriptedSource {
        fn new(limit: Option<u64>) -> (Self, Arc<AtomicU64>) {
            let produced = Arc::new(AtomicU64::new(0));
            (
                Self {
                    next: 0,
                    limit,
                    fail_at: None,
                    produced: Arc::clone(&produced),
                },
                produced,
            )
        }

        /// Errors instead of ending once `fail_at` frames were produced
        fn with_failure(fail_at: u64) -> (Self, Arc<AtomicU64>) {
            let (mut source, produced) = Self::new(None);
            source.fail_at = Some(fail_at);
            (source, produced)
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            if let Some(limit) = self.limit {
                if self.next >= limit {
                    return Ok(None);
                }
            }
            if let Some(fail_at) = self.fail_at {
                if self.next >= fail_at {
                    return Err(CaptureError("stream truncated".to_string()));
                }
            }
            let frame = Frame::new(self.next, format!("frame_{}.png", self.next));
            self.next += 1;
            self.produced.fetch_add(1, Ordering::SeqCst);
            Ok(Some(frame))
        }

        fn reset(&mut self) -> Result<(), CaptureError> {
            self.next = 0;
            Ok(())
        }
    }

    /// Flags configured sequence numbers with `{label: "X", score: 0.9}`
    struct SequenceClassifier {
        positive_at: Vec<u64>,
    }

    impl Classifier for SequenceClassifier {
        fn name(&self) -> &str {
            "classifierA"
        }

        fn classify(&self, frame: &Frame) -> Result<Vec<RawDetection>, ClassifierError> {
            if self.positive_at.contains(&frame.sequence) {
                Ok(vec![RawDetection {
                    label: "X".to_string(),
                    score: 0.9,
                }])
            } else {
                Ok(vec![])
            }
        }
    }

    /// Backend whose targets die on terminate (or never, when `immortal`)
    struct FakeBackend {
        kind: TargetKind,
        live: Arc<parking_lot::Mutex<Vec<String>>>,
        immortal: bool,
        verify_attempts: u32,
    }

    impl FakeBackend {
        fn new(kind: TargetKind, ids: &[&str], immortal: bool) -> Self {
            Self {
                kind,
                live: Arc::new(parking_lot::Mutex::new(
                    ids.iter().map(|s| s.to_string()).collect(),
                )),
                immortal,
                verify_attempts: 2,
            }
        }
    }

    impl DeviceBackend for FakeBackend {
        fn kind(&self) -> TargetKind {
            self.kind
        }

        fn available(&self) -> bool {
            true
        }

        fn enumerate(&self) -> Result<Vec<Target>, ControlError> {
            Ok(self
                .live
                .lock()
                .iter()
                .map(|id| Target::new(self.kind, id.clone()))
                .collect())
        }

        fn terminate(&self, target: &Target) -> Result<(), ControlError> {
            if !self.immortal {
                self.live.lock().retain(|id| id != &target.id);
            }
            Ok(())
        }

        fn verify_attempts(&self) -> u32 {
            self.verify_attempts
        }
    }

    struct CollectingNotifier {
        sent: Arc<parking_lot::Mutex<Vec<IncidentReport>>>,
    }

    impl Notifier for CollectingNotifier {
        fn send(&self, report: &IncidentReport) -> Result<(), NotifyError> {
            self.sent.lock().push(report.clone());
            Ok(())
        }
    }

    fn fast_config(dir: &std::path::Path) -> MonitorConfig {
        MonitorConfig {
            capture_interval: Duration::from_millis(2),
            frame_stride: 30,
            verify_interval: Duration::from_millis(1),
            stop_timeout: Duration::from_secs(2),
            data_dir: dir.to_path_buf(),
        }
    }

    struct Harness {
        monitor: Monitor,
        produced: Arc<AtomicU64>,
        sent: Arc<parking_lot::Mutex<Vec<IncidentReport>>>,
        _tmp: TempDir,
    }

    fn harness(
        limit: Option<u64>,
        positive_at: Vec<u64>,
        backends: Vec<Box<dyn DeviceBackend>>,
    ) -> Harness {
        let tmp = TempDir::new().unwrap();
        let (source, produced) = ScriptedSource::new(limit);

        let mut gateway = DetectionGateway::new();
        gateway.register(
            Box::new(SequenceClassifier { positive_at }),
            ClassifierProfile::new(&["X"], 0.5),
        );

        let orchestrator = ResponseOrchestrator::new(backends, Duration::from_millis(1));
        let audit = AuditLog::new(tmp.path()).unwrap();
        let sent = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let notifier = Box::new(CollectingNotifier {
            sent: Arc::clone(&sent),
        });

        Harness {
            monitor: Monitor::new(
                fast_config(tmp.path()),
                Box::new(source),
                gateway,
                orchestrator,
                audit,
                notifier,
            ),
            produced,
            sent,
            _tmp: tmp,
        }
    }

    fn wait_until_stopped(monitor: &Monitor) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while monitor.status().state != SessionState::Stopped {
            assert!(Instant::now() < deadline, "worker did not stop in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_negative_ticks_never_react() {
        let h = harness(None, vec![], vec![]);
        assert!(h.monitor.start());

        std::thread::sleep(Duration::from_millis(60));
        assert!(h.monitor.status().running);
        assert!(h.sent.lock().is_empty());
        assert!(h.monitor.detections().unwrap().is_empty());

        assert!(h.monitor.stop());
    }

    #[test]
    fn test_first_positive_reacts_exactly_once() {
        // Scenario A: three negative ticks, then a positive verdict
        let backend = FakeBackend::new(TargetKind::AndroidEmulator, &["d1"], false);
        let h = harness(None, vec![3], vec![Box::new(backend)]);

        assert!(h.monitor.start());
        wait_until_stopped(&h.monitor);

        let detections = h.monitor.detections().unwrap();
        assert_eq!(detections.len(), 1);
        let finding = &detections[0].detected_content.findings[0];
        assert_eq!(finding.source, "classifierA");
        assert_eq!(finding.label, "X");
        assert!((finding.score - 0.9).abs() < f32::EPSILON);

        let sent = h.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("classifierA:X"));
        assert!(sent[0].containment.outcome_for("d1").unwrap().verified);

        // Three negative ticks counted, and analysis stopped at the reaction
        assert_eq!(h.monitor.status().frame_counter, 3);
        assert_eq!(h.produced.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_partial_containment_surfaces_in_report() {
        // Scenario B: d1 terminates and verifies, d2 never stops
        let android = FakeBackend::new(TargetKind::AndroidEmulator, &["d1"], false);
        let ios = FakeBackend::new(TargetKind::IosSimulator, &["d2"], true);
        let h = harness(None, vec![0], vec![Box::new(android), Box::new(ios)]);

        assert!(h.monitor.start());
        wait_until_stopped(&h.monitor);

        let sent = h.sent.lock();
        assert_eq!(sent.len(), 1);
        let containment = &sent[0].containment;
        assert!(containment.outcome_for("d1").unwrap().verified);
        assert!(!containment.outcome_for("d2").unwrap().verified);
        let remaining: Vec<_> = containment.remaining.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(remaining, vec!["d2"]);
    }

    #[test]
    fn test_start_is_idempotent_while_running() {
        let h = harness(None, vec![], vec![]);
        assert!(h.monitor.start());
        let first_id = h.monitor.status().session_id;

        assert!(!h.monitor.start());
        assert_eq!(h.monitor.status().session_id, first_id);

        assert!(h.monitor.stop());
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let h = harness(None, vec![], vec![]);
        assert!(!h.monitor.stop());
        assert_eq!(h.monitor.status().state, SessionState::Idle);
    }

    #[test]
    fn test_stop_latency_is_bounded_by_tick_not_interval() {
        let tmp = TempDir::new().unwrap();
        let (source, _) = ScriptedSource::new(None);
        let mut config = fast_config(tmp.path());
        config.capture_interval = Duration::from_secs(30);

        let monitor = Monitor::new(
            config,
            Box::new(source),
            DetectionGateway::new(),
            ResponseOrchestrator::new(vec![], Duration::from_millis(1)),
            AuditLog::new(tmp.path()).unwrap(),
            Box::new(crate::logic::notify::LogNotifier),
        );

        assert!(monitor.start());
        std::thread::sleep(Duration::from_millis(50));

        let begin = Instant::now();
        assert!(monitor.stop());
        assert!(begin.elapsed() < Duration::from_secs(2));
        assert_eq!(monitor.status().state, SessionState::Stopped);
    }

    #[test]
    fn test_restart_creates_fresh_session() {
        let h = harness(None, vec![], vec![]);
        assert!(h.monitor.start());
        let first_id = h.monitor.status().session_id;
        assert!(h.monitor.stop());

        assert!(h.monitor.start());
        let second_id = h.monitor.status().session_id;
        assert!(second_id.is_some());
        assert_ne!(first_id, second_id);
        assert_eq!(h.monitor.status().frame_counter, 0);

        assert!(h.monitor.stop());
    }

    #[test]
    fn test_analyze_media_rejected_while_running() {
        let h = harness(None, vec![], vec![]);
        assert!(h.monitor.start());

        let (mut media, _) = ScriptedSource::new(Some(10));
        let result = h.monitor.analyze_media(&mut media);
        assert!(matches!(result, Err(MediaError::SessionActive)));

        assert!(h.monitor.stop());
    }

    #[test]
    fn test_analyze_media_samples_every_nth_frame() {
        // 120 frames, stride 30: samples sequences 29, 59, 89, 119
        let backend = FakeBackend::new(TargetKind::AndroidEmulator, &["d1"], false);
        let h = harness(None, vec![29, 59], vec![Box::new(backend)]);

        let (mut media, _) = ScriptedSource::new(Some(120));
        let analysis = h.monitor.analyze_media(&mut media).unwrap();

        assert_eq!(analysis.frames_scanned, 120);
        assert_eq!(analysis.frames_sampled, 4);
        assert_eq!(analysis.verdict.findings.len(), 2);
        assert!(analysis.containment.is_some());

        assert_eq!(h.sent.lock().len(), 1);
        let detections = h.monitor.detections().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].image_reference, "frame_29.png");

        // The message log carries the same breadcrumbs as a live reaction
        let messages = h.monitor.messages().unwrap();
        assert!(messages
            .iter()
            .any(|m| m.message.contains("containment started")));
    }

    #[test]
    fn test_analyze_media_keeps_findings_when_stream_truncates() {
        // Sequence 29 is sampled and flagged; the source then errors instead
        // of ending cleanly. The scan ends there but the reaction still runs
        // on what was gathered.
        let backend = FakeBackend::new(TargetKind::AndroidEmulator, &["d1"], false);
        let h = harness(None, vec![29], vec![Box::new(backend)]);

        let (mut media, _) = ScriptedSource::with_failure(30);
        let analysis = h.monitor.analyze_media(&mut media).unwrap();

        assert_eq!(analysis.frames_scanned, 30);
        assert!(analysis.verdict.is_positive());
        assert!(analysis.containment.is_some());

        let detections = h.monitor.detections().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].image_reference, "frame_29.png");
        assert_eq!(h.sent.lock().len(), 1);
    }

    #[test]
    fn test_no_audit_writes_after_stop_returns() {
        // A positive far beyond the stop point must never land once stop()
        // has returned.
        let backend = FakeBackend::new(TargetKind::AndroidEmulator, &["d1"], false);
        let h = harness(None, vec![100_000], vec![Box::new(backend)]);

        assert!(h.monitor.start());
        std::thread::sleep(Duration::from_millis(30));
        assert!(h.monitor.stop());

        let detections = h.monitor.detections().unwrap().len();
        let messages = h.monitor.messages().unwrap().len();
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(h.monitor.detections().unwrap().len(), detections);
        assert_eq!(h.monitor.messages().unwrap().len(), messages);
        assert!(h.sent.lock().is_empty());
    }

    #[test]
    fn test_analyze_media_negative_stream_takes_no_action() {
        let h = harness(None, vec![], vec![]);

        let (mut media, _) = ScriptedSource::new(Some(90));
        let analysis = h.monitor.analyze_media(&mut media).unwrap();

        assert!(!analysis.verdict.is_positive());
        assert!(analysis.containment.is_none());
        assert!(h.sent.lock().is_empty());
        assert!(h.monitor.detections().unwrap().is_empty());
    }
}
