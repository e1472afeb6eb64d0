//! The final reply and its advisory confidence metadata.
//!
//! Grounding annotations never remove or edit content — they only tag it,
//! leaving any decision to act on low confidence to the caller.

use serde::{Deserialize, Serialize};
use crate::task::TaskReport;

/// Whether a claim in the reply is backed by the context used to produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// A used record's value appears in the claim
    Supported,
    /// The claim references a known fact type but conflicts with its value
    Unsupported,
    /// No related fact type was present in the used context
    Unknown,
}

/// Per-claim grounding tag. Advisory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAnnotation {
    /// The claim (sentence) this annotation applies to
    pub claim: String,

    /// The verdict
    pub verdict: Verdict,

    /// IDs of the context records that support the claim, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supporting_records: Vec<String>,
}

/// The outbound reply for one utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    /// The reply text
    pub text: String,

    /// Advisory grounding annotations, one per detected claim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<ConfidenceAnnotation>,

    /// Per-task terminal states when the orchestrator path ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_report: Option<TaskReport>,
}

impl Reply {
    /// A bare text reply with no metadata yet.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotations: Vec::new(),
            task_report: None,
        }
    }

    pub fn with_annotations(mut self, annotations: Vec<ConfidenceAnnotation>) -> Self {
        self.annotations = annotations;
        self
    }

    pub fn with_task_report(mut self, report: TaskReport) -> Self {
        self.task_report = Some(report);
        self
    }

    /// True when any annotation is below full support.
    pub fn has_low_confidence_claims(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| a.verdict != Verdict::Supported)
    }
}
