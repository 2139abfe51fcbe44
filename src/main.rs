//! Screen Sentinel daemon entry point
//!
//! Wires the capture source, classifiers, device backends, audit log, and
//! notifier together, probes the control tools, and runs until killed. The
//! HTTP front end lives elsewhere; it drives the same `Monitor` surface.

use std::time::Duration;

use screen_sentinel::{
    constants, AdbBackend, AuditLog, ClassifierProfile, CommandClassifier, CommandFrameSource,
    DetectionGateway, DeviceBackend, LogNotifier, Monitor, MonitorConfig, Notifier,
    ResponseOrchestrator, SimctlBackend, WebhookNotifier,
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!(
        "Starting {} v{}",
        constants::APP_NAME,
        constants::APP_VERSION
    );

    let config = MonitorConfig::default();

    // Device control backends, probed once at startup
    let adb = AdbBackend::new();
    if adb.available() {
        match adb.probe() {
            Ok(()) => log::info!("adb is accessible"),
            Err(e) => log::error!("Error running adb: {}", e),
        }
    }
    let simctl = SimctlBackend::new();
    if simctl.available() {
        match simctl.probe() {
            Ok(()) => log::info!("simctl is accessible"),
            Err(e) => log::error!("Error running simctl: {}", e),
        }
    }
    let backends: Vec<Box<dyn DeviceBackend>> = vec![Box::new(adb), Box::new(simctl)];
    let orchestrator = ResponseOrchestrator::new(
        backends,
        Duration::from_secs(constants::get_verify_interval_secs()),
    );

    // Classifiers are external tools; register whichever are configured
    let mut gateway = DetectionGateway::new();
    if let Some((program, args)) = command_from_env("SENTINEL_EXPOSURE_CMD") {
        gateway.register(
            Box::new(CommandClassifier::new("exposure", program, args)),
            ClassifierProfile::exposure(),
        );
    }
    if let Some((program, args)) = command_from_env("SENTINEL_OBJECT_CMD") {
        gateway.register(
            Box::new(CommandClassifier::new("object", program, args)),
            ClassifierProfile::object_detector(),
        );
    }
    if gateway.classifier_count() == 0 {
        log::warn!(
            "No classifiers configured (SENTINEL_EXPOSURE_CMD / SENTINEL_OBJECT_CMD); \
             every frame will read as negative"
        );
    }

    let (capture_program, capture_args) = command_from_env("SENTINEL_CAPTURE_CMD")
        .unwrap_or_else(|| ("screencapture".to_string(), vec!["-x".to_string()]));
    let source = CommandFrameSource::new(
        capture_program,
        capture_args,
        config.data_dir.join("screenshots"),
    );

    let audit = match AuditLog::new(&config.data_dir) {
        Ok(audit) => audit,
        Err(e) => {
            log::error!("Cannot open audit log in {}: {}", config.data_dir.display(), e);
            std::process::exit(1);
        }
    };

    let notifier: Box<dyn Notifier> = match constants::get_webhook_url() {
        Some(url) => {
            log::info!("Operator notifications via webhook");
            Box::new(WebhookNotifier::new(url))
        }
        None => {
            log::warn!("SENTINEL_WEBHOOK_URL not set; reports will only reach the logs");
            Box::new(LogNotifier)
        }
    };

    let monitor = Monitor::new(config, Box::new(source), gateway, orchestrator, audit, notifier);
    monitor.start();

    // Headless daemon: the session runs (and reacts at most once) until the
    // process is killed.
    loop {
        std::thread::park();
    }
}

/// Split an env var like `"python3 classify.py --fast"` into program + args
fn command_from_env(key: &str) -> Option<(String, Vec<String>)> {
    let raw = std::env::var(key).ok()?;
    let mut parts = raw.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}
