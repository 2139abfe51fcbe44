//! Detection Types

use serde::{Deserialize, Serialize};

/// A single classification result that passed its classifier's threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Name of the classifier that produced this finding
    pub source: String,

    /// Category label, classifier-defined vocabulary
    pub label: String,

    /// Score on the classifier's own scale
    pub score: f32,
}

/// Aggregated determination for one frame.
///
/// Positive iff at least one finding survived per-classifier filtering; an
/// empty verdict is negative. Findings keep classifier output order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub findings: Vec<Finding>,
}

impl Verdict {
    pub fn is_positive(&self) -> bool {
        !self.findings.is_empty()
    }

    /// Findings grouped by classifier, preserving first-seen source order
    pub fn by_source(&self) -> Vec<(&str, Vec<&Finding>)> {
        let mut groups: Vec<(&str, Vec<&Finding>)> = Vec::new();
        for finding in &self.findings {
            match groups.iter_mut().find(|(name, _)| *name == finding.source) {
                Some((_, list)) => list.push(finding),
                None => groups.push((finding.source.as_str(), vec![finding])),
            }
        }
        groups
    }

    /// Fold another verdict into this one (recorded-stream aggregation)
    pub fn merge(&mut self, other: Verdict) {
        self.findings.extend(other.findings);
    }

    pub fn summary(&self) -> String {
        if self.findings.is_empty() {
            return "no findings".to_string();
        }
        self.findings
            .iter()
            .map(|f| format!("{}:{} ({:.2})", f.source, f.label, f.score))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
