//! The tiered query router.
//!
//! Runs only when the fast path misses. Computes a coarse intent class from
//! a small rule-based signal set, maps the class to an execution path and a
//! model/temperature profile, and resolves near-ties toward the smaller
//! blast radius: a wrong simple answer is cheaper to correct than an
//! unnecessary decomposition.
//!
//! Decisions are logged with their input signals for offline evaluation but
//! never persisted as conversation state — there is no feedback loop here.

use confab_config::AppConfig;
use confab_core::classification::{
    ClassificationResult, ExecutionPath, IntentClass, ModelProfile,
};
use confab_core::utterance::{ConversationState, Utterance};
use tracing::debug;

use crate::signals::{self, Signals};

/// Maps an utterance to an intent class, execution path, and profile.
pub struct QueryRouter {
    tie_margin: f32,
    conversational_profile: ModelProfile,
    precise_profile: ModelProfile,
}

impl QueryRouter {
    pub fn new(
        tie_margin: f32,
        conversational_profile: ModelProfile,
        precise_profile: ModelProfile,
    ) -> Self {
        Self {
            tie_margin,
            conversational_profile,
            precise_profile,
        }
    }

    /// Build a router from the application config's profile table.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.router.tie_margin,
            config.profile_for(IntentClass::Conversational),
            config.profile_for(IntentClass::FactualLookup),
        )
    }

    /// Classify one utterance. Pure over (text, conversation state):
    /// identical inputs produce identical results.
    pub fn route(
        &self,
        utterance: &Utterance,
        state: &ConversationState,
    ) -> ClassificationResult {
        let signals = signals::extract(&utterance.text);
        let scores = score(&signals, state);

        let intent = pick(&scores, self.tie_margin);
        let confidence = scores
            .iter()
            .find(|(class, _)| *class == intent)
            .map(|(_, s)| *s)
            .unwrap_or(0.0);

        let path = match intent {
            IntentClass::Conversational | IntentClass::FactualLookup => {
                ExecutionPath::SingleCompletion
            }
            IntentClass::Action => ExecutionPath::HandlerCall,
            IntentClass::ComplexMultiStep => ExecutionPath::MultiAgent,
        };

        let profile = match intent {
            IntentClass::Conversational => self.conversational_profile.clone(),
            _ => self.precise_profile.clone(),
        };

        debug!(
            intent = %intent,
            path = %path,
            confidence,
            action_verbs = signals.action_verbs,
            question_shape = signals.question_shape,
            memory_reference = signals.memory_reference,
            sequence_markers = signals.sequence_markers,
            "route selected"
        );

        ClassificationResult {
            intent,
            confidence,
            path,
            profile,
        }
    }
}

/// Score each class from the signal set. Additive weights, clamped to 1.0.
fn score(signals: &Signals, state: &ConversationState) -> [(IntentClass, f32); 4] {
    let mut conversational: f32 = 0.2;
    if signals.conversational_marker {
        conversational += 0.6;
    }
    if signals.words <= 4 && !signals.question_shape && !signals.leading_action_verb {
        conversational += 0.15;
    }
    // Short affirmations mid-conversation read as chat, not commands.
    if signals.words <= 2 && !state.is_empty() {
        conversational += 0.1;
    }

    let mut factual: f32 = 0.0;
    if signals.question_shape {
        factual += 0.5;
    }
    if signals.memory_reference {
        factual += 0.35;
    }
    if signals.question_shape && signals.temporal_reference {
        factual += 0.1;
    }

    let mut action: f32 = 0.0;
    if signals.leading_action_verb {
        action += 0.55;
    }
    if signals.action_verbs == 1 {
        action += 0.15;
    }
    if signals.leading_action_verb && signals.temporal_reference {
        action += 0.1;
    }

    let mut complex: f32 = 0.0;
    if signals.action_verbs >= 2 {
        complex += 0.55;
    }
    if signals.sequence_markers >= 1 && signals.action_verbs >= 1 {
        complex += 0.25;
    }
    if signals.words > 10 && signals.action_verbs >= 2 {
        complex += 0.1;
    }

    [
        (IntentClass::Conversational, conversational.min(1.0)),
        (IntentClass::FactualLookup, factual.min(1.0)),
        (IntentClass::Action, action.min(1.0)),
        (IntentClass::ComplexMultiStep, complex.min(1.0)),
    ]
}

/// Pick the winning class. All classes within `margin` of the top score are
/// near-ties; among them the smallest blast radius wins.
fn pick(scores: &[(IntentClass, f32); 4], margin: f32) -> IntentClass {
    let top = scores
        .iter()
        .map(|(_, s)| *s)
        .fold(f32::NEG_INFINITY, f32::max);

    scores
        .iter()
        .filter(|(_, s)| top - *s <= margin)
        .min_by_key(|(class, _)| class.blast_radius())
        .map(|(class, _)| *class)
        .expect("score table is non-empty")
}
