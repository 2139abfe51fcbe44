//! Device Control Backends
//!
//! Each target kind supplies {enumerate, terminate} through its own control
//! tool: adb for Android emulators, `xcrun simctl` for iOS simulators. A
//! missing tool degrades that kind to always-empty enumeration and
//! always-fail termination; it is logged once at construction and never
//! crashes the process.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{ControlError, Target, TargetKind};
use crate::constants;

// ============================================================================
// BACKEND CAPABILITY
// ============================================================================

/// Capability set for one family of controllable endpoints
pub trait DeviceBackend: Send + Sync {
    fn kind(&self) -> TargetKind;

    /// Whether the control tool is usable on this host
    fn available(&self) -> bool;

    /// Point-in-time query of live targets of this kind
    fn enumerate(&self) -> Result<Vec<Target>, ControlError>;

    /// Issue the kind-specific termination command. Issuing is separate from
    /// verification; the orchestrator polls `enumerate` afterwards.
    fn terminate(&self, target: &Target) -> Result<(), ControlError>;

    /// Liveness polls to spend verifying one termination
    fn verify_attempts(&self) -> u32;
}

// ============================================================================
// COMMAND EXECUTION
// ============================================================================

/// Run a command with a hard timeout, killing it on expiry.
///
/// A timed-out command is a failed attempt, not a fatal error.
pub(crate) fn run_with_timeout(
    mut command: Command,
    label: &str,
    timeout: Duration,
) -> Result<std::process::Output, ControlError> {
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| ControlError::CommandFailed {
            command: label.to_string(),
            detail: e.to_string(),
        })?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    log::error!("Timeout while running '{}'", label);
                    return Err(ControlError::Timeout {
                        command: label.to_string(),
                    });
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                return Err(ControlError::CommandFailed {
                    command: label.to_string(),
                    detail: e.to_string(),
                })
            }
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|e| ControlError::CommandFailed {
            command: label.to_string(),
            detail: e.to_string(),
        })?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(ControlError::CommandFailed {
            command: label.to_string(),
            detail: format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        })
    }
}

/// Look up a binary on PATH
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn command_timeout() -> Duration {
    Duration::from_secs(constants::get_command_timeout_secs())
}

// ============================================================================
// ANDROID (adb)
// ============================================================================

pub struct AdbBackend {
    adb_path: Option<PathBuf>,
    verify_attempts: u32,
}

impl AdbBackend {
    pub fn new() -> Self {
        let adb_path = constants::get_adb_path()
            .filter(|p| p.is_file())
            .or_else(|| find_in_path("adb"))
            .or_else(|| {
                let fallback = PathBuf::from(constants::DEFAULT_ADB_PATH);
                fallback.is_file().then_some(fallback)
            });

        match &adb_path {
            Some(path) => log::info!("Using adb at: {}", path.display()),
            None => log::error!("adb not found. Android emulator control will not be available."),
        }

        Self {
            adb_path,
            verify_attempts: constants::DEFAULT_ANDROID_VERIFY_ATTEMPTS,
        }
    }

    /// Probe that the tool actually runs (`adb version`)
    pub fn probe(&self) -> Result<(), ControlError> {
        let adb = self.adb()?;
        let mut cmd = Command::new(adb);
        cmd.arg("version");
        run_with_timeout(cmd, "adb version", command_timeout()).map(|_| ())
    }

    fn adb(&self) -> Result<&Path, ControlError> {
        self.adb_path
            .as_deref()
            .ok_or_else(|| ControlError::ToolUnavailable {
                tool: "adb".to_string(),
            })
    }
}

impl Default for AdbBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for AdbBackend {
    fn kind(&self) -> TargetKind {
        TargetKind::AndroidEmulator
    }

    fn available(&self) -> bool {
        self.adb_path.is_some()
    }

    fn enumerate(&self) -> Result<Vec<Target>, ControlError> {
        let Ok(adb) = self.adb() else {
            // Degraded: no tool means no visible targets
            return Ok(Vec::new());
        };

        let mut cmd = Command::new(adb);
        cmd.arg("devices");
        let output = run_with_timeout(cmd, "adb devices", command_timeout())?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        // First line is the "List of devices attached" header
        let targets = stdout
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| line.split('\t').next())
            .map(|id| Target::new(TargetKind::AndroidEmulator, id))
            .collect();

        Ok(targets)
    }

    fn terminate(&self, target: &Target) -> Result<(), ControlError> {
        let adb = self.adb()?;
        let mut cmd = Command::new(adb);
        cmd.args(["-s", &target.id, "emu", "kill"]);
        run_with_timeout(cmd, "adb emu kill", command_timeout())?;
        log::info!("Sent kill command to Android emulator {}", target.id);
        Ok(())
    }

    fn verify_attempts(&self) -> u32 {
        self.verify_attempts
    }
}

// ============================================================================
// iOS (xcrun simctl)
// ============================================================================

static BOOTED_DEVICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([0-9A-Fa-f-]{8,})\)\s*\(Booted\)").unwrap());

pub struct SimctlBackend {
    xcrun_path: Option<PathBuf>,
    verify_attempts: u32,
}

impl SimctlBackend {
    pub fn new() -> Self {
        let xcrun_path = Self::find_xcrun();

        match &xcrun_path {
            Some(path) => log::info!("Using xcrun at: {}", path.display()),
            None => {
                log::error!("Could not find xcrun. iOS simulator control will not be available.")
            }
        }

        Self {
            xcrun_path,
            verify_attempts: constants::DEFAULT_IOS_VERIFY_ATTEMPTS,
        }
    }

    fn find_xcrun() -> Option<PathBuf> {
        if let Some(path) = find_in_path("xcrun") {
            return Some(path);
        }

        let common_locations = [
            "/usr/bin/xcrun",
            "/Applications/Xcode.app/Contents/Developer/usr/bin/xcrun",
            "/Library/Developer/CommandLineTools/usr/bin/xcrun",
        ];
        common_locations
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
    }

    /// Probe that the tool actually runs (`xcrun simctl help`)
    pub fn probe(&self) -> Result<(), ControlError> {
        let xcrun = self.xcrun()?;
        let mut cmd = Command::new(xcrun);
        cmd.args(["simctl", "help"]);
        run_with_timeout(cmd, "simctl help", command_timeout()).map(|_| ())
    }

    fn xcrun(&self) -> Result<&Path, ControlError> {
        self.xcrun_path
            .as_deref()
            .ok_or_else(|| ControlError::ToolUnavailable {
                tool: "xcrun simctl".to_string(),
            })
    }

    pub(crate) fn parse_booted(listing: &str) -> Vec<Target> {
        BOOTED_DEVICE_RE
            .captures_iter(listing)
            .map(|caps| Target::new(TargetKind::IosSimulator, &caps[1]))
            .collect()
    }
}

impl Default for SimctlBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBackend for SimctlBackend {
    fn kind(&self) -> TargetKind {
        TargetKind::IosSimulator
    }

    fn available(&self) -> bool {
        self.xcrun_path.is_some()
    }

    fn enumerate(&self) -> Result<Vec<Target>, ControlError> {
        let Ok(xcrun) = self.xcrun() else {
            return Ok(Vec::new());
        };

        let mut cmd = Command::new(xcrun);
        cmd.args(["simctl", "list", "devices"]);
        let output = run_with_timeout(cmd, "simctl list devices", command_timeout())?;
        Ok(Self::parse_booted(&String::from_utf8_lossy(&output.stdout)))
    }

    fn terminate(&self, target: &Target) -> Result<(), ControlError> {
        let xcrun = self.xcrun()?;
        let mut cmd = Command::new(xcrun);
        cmd.args(["simctl", "shutdown", &target.id]);
        run_with_timeout(cmd, "simctl shutdown", command_timeout())?;
        log::info!("Sent shutdown command to iOS simulator {}", target.id);
        Ok(())
    }

    fn verify_attempts(&self) -> u32 {
        self.verify_attempts
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_booted_simulators() {
        let listing = "\
== Devices ==
-- iOS 17.2 --
    iPhone 15 (0A1B2C3D-1111-2222-3333-444455556666) (Booted)
    iPhone 15 Pro (FFFFFFFF-AAAA-BBBB-CCCC-DDDDEEEE0000) (Shutdown)
    iPad Air (12345678-ABCD-EF01-2345-6789ABCDEF01) (Booted)
";
        let targets = SimctlBackend::parse_booted(listing);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "0A1B2C3D-1111-2222-3333-444455556666");
        assert_eq!(targets[1].id, "12345678-ABCD-EF01-2345-6789ABCDEF01");
        assert!(targets.iter().all(|t| t.kind == TargetKind::IosSimulator));
    }

    #[test]
    fn test_parse_booted_ignores_shutdown_only_listing() {
        let listing = "    iPhone 15 (0A1B2C3D-1111-2222-3333-444455556666) (Shutdown)\n";
        assert!(SimctlBackend::parse_booted(listing).is_empty());
    }

    #[test]
    fn test_run_with_timeout_kills_slow_command() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let result = run_with_timeout(cmd, "sleep 5", Duration::from_millis(150));
        assert!(matches!(result, Err(ControlError::Timeout { .. })));
    }

    #[test]
    fn test_run_with_timeout_reports_exit_failure() {
        let cmd = Command::new("false");
        let result = run_with_timeout(cmd, "false", Duration::from_secs(2));
        assert!(matches!(result, Err(ControlError::CommandFailed { .. })));
    }

    #[test]
    fn test_run_with_timeout_captures_stdout() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        let output = run_with_timeout(cmd, "echo", Duration::from_secs(2)).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }
}
