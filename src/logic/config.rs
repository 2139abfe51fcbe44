//! Monitor configuration
//!
//! All intervals and budgets are tunables, not contracts. Defaults come from
//! `constants` and can be overridden via environment or by building the
//! config by hand (tests shorten every interval).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Pause between two live screen samples
    pub capture_interval: Duration,

    /// Analyze every Nth frame of a recorded stream
    pub frame_stride: u64,

    /// Pause between two liveness polls during termination verification
    pub verify_interval: Duration,

    /// How long `stop()` waits for the worker before logging a warning
    pub stop_timeout: Duration,

    /// Directory holding the detection and message logs
    pub data_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_secs(constants::get_capture_interval_secs()),
            frame_stride: constants::get_frame_stride(),
            verify_interval: Duration::from_secs(constants::get_verify_interval_secs()),
            stop_timeout: Duration::from_secs(constants::DEFAULT_STOP_TIMEOUT_SECS),
            data_dir: constants::get_data_dir(),
        }
    }
}
