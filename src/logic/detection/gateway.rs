//! Detection Gateway
//!
//! Runs an order-independent set of registered classifiers over one frame
//! and aggregates their output into a single verdict. Thresholding and label
//! filtering happen per classifier because score scales are incomparable
//! between classifiers. A classifier failure is logged and normalized to
//! "no findings from that classifier" so partial detector availability never
//! stalls monitoring.

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

use super::types::{Finding, Verdict};
use crate::logic::capture::Frame;

// ============================================================================
// CLASSIFIER CAPABILITY
// ============================================================================

/// Raw output of one classifier before profile filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub score: f32,
}

#[derive(Debug)]
pub struct ClassifierError(pub String);

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClassifierError: {}", self.0)
    }
}

impl std::error::Error for ClassifierError {}

/// Opaque content classifier. Implementations may run in-process models or
/// shell out to external tooling; the gateway only sees (label, score) pairs.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn classify(&self, frame: &Frame) -> Result<Vec<RawDetection>, ClassifierError>;
}

// ============================================================================
// CLASSIFIER PROFILES
// ============================================================================

/// Per-classifier allow-list and score threshold.
///
/// Only raw detections whose label is actionable and whose score clears the
/// threshold become findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierProfile {
    pub actionable_labels: HashSet<String>,
    pub score_threshold: f32,
}

impl ClassifierProfile {
    pub fn new(labels: &[&str], score_threshold: f32) -> Self {
        Self {
            actionable_labels: labels.iter().map(|s| s.to_string()).collect(),
            score_threshold,
        }
    }

    /// Reference profile for a nudity/exposure detector
    pub fn exposure() -> Self {
        Self::new(
            &["EXPOSED_GENITALIA", "EXPOSED_BREAST_F", "EXPOSED_BUTTOCKS"],
            0.7,
        )
    }

    /// Reference profile for a general object detector
    pub fn object_detector() -> Self {
        Self::new(
            &[
                "person",
                "gun",
                "knife",
                "wine glass",
                "bottle",
                "pistol",
                "rifle",
                "shotgun",
                "ammunition",
                "holster",
                "cigarette",
                "syringe",
                "pills",
            ],
            0.1,
        )
    }

    pub fn passes(&self, detection: &RawDetection) -> bool {
        self.actionable_labels.contains(&detection.label)
            && detection.score > self.score_threshold
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

pub struct DetectionGateway {
    classifiers: Vec<(Box<dyn Classifier>, ClassifierProfile)>,
}

impl DetectionGateway {
    pub fn new() -> Self {
        Self {
            classifiers: Vec::new(),
        }
    }

    pub fn register(&mut self, classifier: Box<dyn Classifier>, profile: ClassifierProfile) {
        log::info!(
            "Registered classifier '{}' ({} actionable labels, threshold {})",
            classifier.name(),
            profile.actionable_labels.len(),
            profile.score_threshold
        );
        self.classifiers.push((classifier, profile));
    }

    pub fn classifier_count(&self) -> usize {
        self.classifiers.len()
    }

    /// Analyze one frame across all registered classifiers
    pub fn analyze(&self, frame: &Frame) -> Verdict {
        let mut verdict = Verdict::default();

        for (classifier, profile) in &self.classifiers {
            let raw = match classifier.classify(frame) {
                Ok(raw) => raw,
                Err(e) => {
                    // Treated as zero findings from this classifier
                    log::error!(
                        "Classifier '{}' failed on frame {}: {}",
                        classifier.name(),
                        frame.sequence,
                        e
                    );
                    continue;
                }
            };

            for detection in raw {
                if profile.passes(&detection) {
                    verdict.findings.push(Finding {
                        source: classifier.name().to_string(),
                        label: detection.label,
                        score: detection.score,
                    });
                }
            }
        }

        if verdict.is_positive() {
            log::warn!(
                "Frame {} flagged: {}",
                frame.sequence,
                verdict.summary()
            );
        }
        verdict
    }
}

impl Default for DetectionGateway {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// COMMAND CLASSIFIER
// ============================================================================

/// Classifier bridging to an external tool.
///
/// The tool is invoked with the frame path as its last argument and must
/// print a JSON array of `{"label": ..., "score": ...}` objects on stdout.
pub struct CommandClassifier {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
        }
    }
}

impl Classifier for CommandClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, frame: &Frame) -> Result<Vec<RawDetection>, ClassifierError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg::<&Path>(frame.reference.as_ref())
            .output()
            .map_err(|e| ClassifierError(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(ClassifierError(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ClassifierError(format!("{} output: {}", self.program, e)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
