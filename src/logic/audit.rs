//! Audit Log
//!
//! Append-only history of detections and free-text events, persisted as two
//! JSON array files. Appends are read-modify-rewrite: the whole existing
//! sequence is read, the new entry pushed, and the file rewritten. An absent
//! file reads as an empty sequence, never an error. A single writer is
//! expected (the one worker); the internal mutex serializes appends anyway.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::logic::detection::Verdict;

const DETECTION_LOG_FILE: &str = "detection_log.json";
const MESSAGE_LOG_FILE: &str = "message_log.json";

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub timestamp: DateTime<Utc>,
    pub image_reference: String,
    pub detected_content: Verdict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug)]
pub enum AuditError {
    Io(std::io::Error),
    Format(serde_json::Error),
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditError::Io(e) => write!(f, "audit log I/O error: {}", e),
            AuditError::Format(e) => write!(f, "audit log format error: {}", e),
        }
    }
}

impl std::error::Error for AuditError {}

impl From<std::io::Error> for AuditError {
    fn from(e: std::io::Error) -> Self {
        AuditError::Io(e)
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::Format(e)
    }
}

// ============================================================================
// AUDIT LOG
// ============================================================================

pub struct AuditLog {
    detection_path: PathBuf,
    message_path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditLog {
    /// Open (or create) the audit log in the given directory
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            detection_path: dir.join(DETECTION_LOG_FILE),
            message_path: dir.join(MESSAGE_LOG_FILE),
            write_lock: Mutex::new(()),
        })
    }

    /// Append a detection entry
    pub fn record_detection(
        &self,
        image_reference: &str,
        verdict: &Verdict,
    ) -> Result<(), AuditError> {
        let entry = DetectionRecord {
            timestamp: Utc::now(),
            image_reference: image_reference.to_string(),
            detected_content: verdict.clone(),
        };

        let _guard = self.write_lock.lock();
        append(&self.detection_path, entry)?;
        log::info!("Detection logged: {} ({})", image_reference, verdict.summary());
        Ok(())
    }

    /// Append a free-text event
    pub fn record_message(&self, message: &str) -> Result<(), AuditError> {
        let entry = MessageRecord {
            timestamp: Utc::now(),
            message: message.to_string(),
        };

        let _guard = self.write_lock.lock();
        append(&self.message_path, entry)?;
        log::info!("Message logged: {}", message);
        Ok(())
    }

    /// All detection entries, oldest first
    pub fn detections(&self) -> Result<Vec<DetectionRecord>, AuditError> {
        read_log(&self.detection_path)
    }

    /// All message entries, oldest first
    pub fn messages(&self) -> Result<Vec<MessageRecord>, AuditError> {
        read_log(&self.message_path)
    }
}

fn read_log<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AuditError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn append<T: Serialize + DeserializeOwned>(path: &Path, entry: T) -> Result<(), AuditError> {
    let mut entries: Vec<T> = read_log(path)?;
    entries.push(entry);
    let serialized = serde_json::to_string_pretty(&entries)?;
    std::fs::write(path, serialized)?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
