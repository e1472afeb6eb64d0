//! Classification and routing value objects.
//!
//! A [`ClassificationResult`] is produced exactly once per utterance by the
//! query router and never mutated. Its execution path fully determines which
//! machinery handles the utterance — the router never invokes more than one
//! path for a single utterance.

use serde::{Deserialize, Serialize};

/// Coarse intent class computed by the router's signal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentClass {
    /// Small talk, opinions, chit-chat
    Conversational,
    /// A question answerable from stored facts
    FactualLookup,
    /// One concrete thing to do (a single handler call)
    Action,
    /// Several things to do, needs decomposition
    ComplexMultiStep,
}

impl IntentClass {
    /// Blast-radius rank for tie-breaking: a wrong simple answer is cheaper
    /// to correct than an unnecessary decomposition. Lower rank wins.
    pub fn blast_radius(&self) -> u8 {
        match self {
            Self::Action => 0,
            Self::FactualLookup => 1,
            Self::Conversational => 2,
            Self::ComplexMultiStep => 3,
        }
    }
}

impl std::fmt::Display for IntentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Conversational => "conversational",
            Self::FactualLookup => "factual-lookup",
            Self::Action => "action",
            Self::ComplexMultiStep => "complex-multi-step",
        };
        write!(f, "{s}")
    }
}

/// Which machinery executes the utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionPath {
    /// Template-matched deterministic handling, no completion backend
    FastPath,
    /// One completion call with assembled context
    SingleCompletion,
    /// One expert handler call with minimal context
    HandlerCall,
    /// Decomposed task graph through the orchestrator
    MultiAgent,
}

impl std::fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::FastPath => "fast-path",
            Self::SingleCompletion => "single-completion",
            Self::HandlerCall => "handler-call",
            Self::MultiAgent => "multi-agent",
        };
        write!(f, "{s}")
    }
}

/// A named model/temperature profile. The class → profile mapping is
/// configuration, not logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Profile name (e.g., "chat", "precise")
    pub name: String,

    /// Model identifier sent to the completion backend
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum output budget
    pub max_tokens: u32,
}

impl ModelProfile {
    pub fn new(name: impl Into<String>, model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            temperature,
            max_tokens,
        }
    }
}

/// The router's decision for one utterance. Produced once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// The winning intent class
    pub intent: IntentClass,

    /// Confidence in the winning class (0.0–1.0)
    pub confidence: f32,

    /// The execution path the class maps to
    pub path: ExecutionPath,

    /// The model/temperature profile for paths that reach the backend
    pub profile: ModelProfile,
}

/// A fast-path hit: one handler plus the arguments extracted from the
/// matched template. Bypasses the router and orchestrator entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeterministicAction {
    /// Name of the expert handler to invoke
    pub handler: String,

    /// Structured arguments extracted from the template placeholders
    pub args: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blast_radius_ordering() {
        // action < factual-lookup < conversational < complex-multi-step
        assert!(IntentClass::Action.blast_radius() < IntentClass::FactualLookup.blast_radius());
        assert!(
            IntentClass::FactualLookup.blast_radius() < IntentClass::Conversational.blast_radius()
        );
        assert!(
            IntentClass::Conversational.blast_radius()
                < IntentClass::ComplexMultiStep.blast_radius()
        );
    }

    #[test]
    fn intent_class_display() {
        assert_eq!(IntentClass::FactualLookup.to_string(), "factual-lookup");
        assert_eq!(IntentClass::ComplexMultiStep.to_string(), "complex-multi-step");
    }

    #[test]
    fn classification_serialization() {
        let result = ClassificationResult {
            intent: IntentClass::Action,
            confidence: 0.8,
            path: ExecutionPath::HandlerCall,
            profile: ModelProfile::new("precise", "small-fast", 0.2, 512),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("action"));
        assert!(json.contains("handler-call"));
        assert!(json.contains("precise"));
    }
}
