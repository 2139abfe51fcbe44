//! Central Configuration Constants
//!
//! Single source of truth for all tunable defaults.
//! Every value can be overridden with a `SENTINEL_*` environment variable.

use std::path::PathBuf;

/// Seconds between two live screen samples
pub const DEFAULT_CAPTURE_INTERVAL_SECS: u64 = 3;

/// Analyze every Nth frame of a recorded stream
pub const DEFAULT_FRAME_STRIDE: u64 = 30;

/// Seconds between two liveness polls during termination verification
pub const DEFAULT_VERIFY_INTERVAL_SECS: u64 = 1;

/// Liveness polls before giving up on an Android emulator
pub const DEFAULT_ANDROID_VERIFY_ATTEMPTS: u32 = 5;

/// Liveness polls before giving up on an iOS simulator (slower shutdown)
pub const DEFAULT_IOS_VERIFY_ATTEMPTS: u32 = 10;

/// Timeout for a single external control command (adb / simctl)
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// How long `stop()` waits for the worker to exit before giving up
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 5;

/// Default adb binary when `SENTINEL_ADB_PATH` is not set and adb is not on PATH
pub const DEFAULT_ADB_PATH: &str = "/opt/homebrew/bin/adb";

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "screen-sentinel";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get capture interval from environment or use default
pub fn get_capture_interval_secs() -> u64 {
    env_u64("SENTINEL_CAPTURE_INTERVAL", DEFAULT_CAPTURE_INTERVAL_SECS)
}

/// Get recorded-stream sampling stride from environment or use default
pub fn get_frame_stride() -> u64 {
    env_u64("SENTINEL_FRAME_STRIDE", DEFAULT_FRAME_STRIDE).max(1)
}

/// Get verification poll interval from environment or use default
pub fn get_verify_interval_secs() -> u64 {
    env_u64("SENTINEL_VERIFY_INTERVAL", DEFAULT_VERIFY_INTERVAL_SECS)
}

/// Get external command timeout from environment or use default
pub fn get_command_timeout_secs() -> u64 {
    env_u64("SENTINEL_COMMAND_TIMEOUT", DEFAULT_COMMAND_TIMEOUT_SECS)
}

/// Get adb path from environment, falling back to PATH lookup then the default
pub fn get_adb_path() -> Option<PathBuf> {
    std::env::var("SENTINEL_ADB_PATH").ok().map(PathBuf::from)
}

/// Get the operator webhook URL, if configured
pub fn get_webhook_url() -> Option<String> {
    std::env::var("SENTINEL_WEBHOOK_URL")
        .ok()
        .filter(|s| !s.is_empty())
}

/// Get data directory from environment or use the platform default
pub fn get_data_dir() -> PathBuf {
    std::env::var("SENTINEL_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
        })
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
