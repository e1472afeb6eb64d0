//! Signal extraction for the query router.
//!
//! A small, fixed lexicon set — keyword presence, action-verb counts,
//! temporal/memory references, question shape. All pure functions over the
//! lowercased utterance so classification stays deterministic and cheap.

/// Verbs that indicate something to do.
const ACTION_VERBS: &[&str] = &[
    "add", "remove", "delete", "schedule", "remind", "set", "turn", "create", "cancel", "book",
    "send", "start", "stop", "play", "pause", "order", "buy", "update", "move", "write", "call",
    "dim", "lock", "unlock",
];

/// Words that reference stored facts or past events.
const MEMORY_WORDS: &[&str] = &[
    "remember", "recall", "forgot", "forget", "my name", "my birthday", "told you", "last time",
    "what is my", "who is my", "when did",
];

/// Temporal references.
const TEMPORAL_WORDS: &[&str] = &[
    "today", "tomorrow", "yesterday", "tonight", "morning", "afternoon", "evening", "next week",
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "at noon",
    "o'clock",
];

/// Greetings and chit-chat markers.
const CONVERSATIONAL_WORDS: &[&str] = &[
    "hello", "hi", "hey", "thanks", "thank you", "good morning", "good evening", "good night",
    "how are you", "what do you think", "tell me a joke", "nice",
];

/// Markers that one request contains several steps.
const SEQUENCE_MARKERS: &[&str] = &["and then", "after that", "then", "as well", "also", ", and "];

/// Question openers.
const QUESTION_OPENERS: &[&str] = &[
    "what", "who", "when", "where", "which", "how", "why", "is", "are", "do", "does", "did",
    "can", "could",
];

/// The extracted signal set for one utterance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Signals {
    pub action_verbs: usize,
    pub leading_action_verb: bool,
    pub memory_reference: bool,
    pub temporal_reference: bool,
    pub question_shape: bool,
    pub conversational_marker: bool,
    pub sequence_markers: usize,
    pub words: usize,
}

pub(crate) fn extract(text: &str) -> Signals {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let action_verbs = words
        .iter()
        .filter(|w| {
            let w = w.trim_matches(|c: char| c.is_ascii_punctuation());
            ACTION_VERBS.contains(&w)
        })
        .count();

    let leading_action_verb = words
        .first()
        .map(|w| ACTION_VERBS.contains(&w.trim_matches(|c: char| c.is_ascii_punctuation())))
        .unwrap_or(false);

    let question_shape = lower.trim_end().ends_with('?')
        || words
            .first()
            .map(|w| QUESTION_OPENERS.contains(w))
            .unwrap_or(false);

    Signals {
        action_verbs,
        leading_action_verb,
        memory_reference: contains_any(&lower, MEMORY_WORDS),
        temporal_reference: contains_any(&lower, TEMPORAL_WORDS),
        question_shape,
        conversational_marker: contains_any(&lower, CONVERSATIONAL_WORDS),
        sequence_markers: SEQUENCE_MARKERS
            .iter()
            .filter(|m| lower.contains(*m))
            .count(),
        words: words.len(),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_action_verbs() {
        let signals = extract("Schedule a meeting and add it to my list");
        assert_eq!(signals.action_verbs, 2);
        assert!(signals.leading_action_verb);
    }

    #[test]
    fn detects_question_shape() {
        assert!(extract("What is my name?").question_shape);
        assert!(extract("who called me").question_shape);
        assert!(!extract("add milk").question_shape);
    }

    #[test]
    fn detects_memory_and_temporal_references() {
        let signals = extract("remember what I told you yesterday");
        assert!(signals.memory_reference);
        assert!(signals.temporal_reference);
    }

    #[test]
    fn detects_sequence_markers() {
        let signals = extract("book a table and then send the invite");
        assert!(signals.sequence_markers >= 1);
    }

    #[test]
    fn empty_input_is_quiet() {
        let signals = extract("");
        assert_eq!(signals.words, 0);
        assert!(!signals.question_shape);
        assert!(!signals.leading_action_verb);
    }
}
