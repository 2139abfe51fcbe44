//! Frame acquisition
//!
//! A `FrameSource` yields successive frames from a screen or a recorded
//! stream. The concrete capture mechanism is external; the supervisor only
//! depends on this trait. `CommandFrameSource` bridges to any host capture
//! tool that can write an image file.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// TYPES
// ============================================================================

/// One sampled image, owned transiently for a single analysis cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Monotonically increasing per-source sequence number
    pub sequence: u64,

    /// Storage reference (path or opaque handle) handed to classifiers
    pub reference: PathBuf,

    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(sequence: u64, reference: impl Into<PathBuf>) -> Self {
        Self {
            sequence,
            reference: reference.into(),
            captured_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct CaptureError(pub String);

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaptureError: {}", self.0)
    }
}

impl std::error::Error for CaptureError {}

// ============================================================================
// FRAME SOURCE
// ============================================================================

/// Supplier of successive frames.
///
/// `Ok(None)` means the stream is exhausted (recorded media); a live source
/// never returns `None`. Errors are transient: the caller logs them and
/// treats the tick as having produced nothing.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Reset transient capture state before a new session. Best-effort.
    fn reset(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }
}

// ============================================================================
// COMMAND FRAME SOURCE
// ============================================================================

/// Frame source that shells out to a host capture command.
///
/// The command receives the output path as its last argument, e.g.
/// `screencapture -x` on macOS. Captured files land in `dir` as
/// `frame_<n>.png`, cleared on `reset` so each session starts empty.
pub struct CommandFrameSource {
    program: String,
    args: Vec<String>,
    dir: PathBuf,
    sequence: u64,
}

impl CommandFrameSource {
    pub fn new(program: impl Into<String>, args: Vec<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            dir: dir.into(),
            sequence: 0,
        }
    }

    fn frame_path(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("frame_{}.png", sequence))
    }
}

impl FrameSource for CommandFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CaptureError(format!("create {}: {}", self.dir.display(), e)))?;

        let path = self.frame_path(self.sequence);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .output()
            .map_err(|e| CaptureError(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(CaptureError(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let frame = Frame::new(self.sequence, &path);
        self.sequence += 1;
        log::debug!("Captured frame {}", frame.reference.display());
        Ok(Some(frame))
    }

    fn reset(&mut self) -> Result<(), CaptureError> {
        self.sequence = 0;
        clear_dir(&self.dir).map_err(|e| CaptureError(format!("reset capture dir: {}", e)))
    }
}

/// Delete and recreate a capture directory
fn clear_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    log::info!("Cleared capture directory {}", dir.display());
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_frame_sequence_is_monotonic() {
        let a = Frame::new(0, "a.png");
        let b = Frame::new(1, "b.png");
        assert!(b.sequence > a.sequence);
    }

    #[test]
    fn test_reset_clears_capture_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("shots");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("frame_0.png"), b"stale").unwrap();

        let mut source = CommandFrameSource::new("true", vec![], &dir);
        source.reset().unwrap();

        assert!(dir.exists());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_failing_capture_command_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let mut source = CommandFrameSource::new("false", vec![], tmp.path());
        assert!(source.next_frame().is_err());
    }
}
