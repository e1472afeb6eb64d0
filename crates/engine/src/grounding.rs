//! Grounding validation — lightweight claim-vs-context comparison.
//!
//! Flags assertions in the reply that conflict with, or go beyond, the
//! records used to produce it. String/entity overlap only, not semantic
//! entailment — lightweight matching false-positives too often for
//! blocking behavior, so the output is purely advisory metadata and the
//! reply is never edited, censored, or withheld.

use confab_core::record::ContextRecord;
use confab_core::reply::{ConfidenceAnnotation, Verdict};
use tracing::warn;

/// Annotate each claim (sentence) of `reply_text` against the used records.
pub fn validate(reply_text: &str, used_context: &[ContextRecord]) -> Vec<ConfidenceAnnotation> {
    let annotations: Vec<ConfidenceAnnotation> = split_claims(reply_text)
        .into_iter()
        .map(|claim| annotate_claim(&claim, used_context))
        .collect();

    // The recurring failure mode worth watching for: context was assembled
    // but the generated reply used none of it.
    if !used_context.is_empty()
        && !annotations.is_empty()
        && annotations.iter().all(|a| a.verdict != Verdict::Supported)
    {
        warn!(
            records = used_context.len(),
            claims = annotations.len(),
            "assembled context unused by completion output"
        );
    }

    annotations
}

/// Split a reply into claims. Sentence-level granularity is enough for
/// overlap checks.
fn split_claims(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim().to_string())
        .filter(|s| s.chars().any(|c| c.is_alphanumeric()))
        .collect()
}

fn annotate_claim(claim: &str, used_context: &[ContextRecord]) -> ConfidenceAnnotation {
    let claim_tokens = tokens(claim);

    let mut supporting: Vec<String> = Vec::new();
    let mut conflicting = false;

    for record in used_context {
        let value_tokens = tokens(&record.value);
        let key_tokens = tokens(&record.key);

        let value_present =
            !value_tokens.is_empty() && value_tokens.iter().all(|t| claim_tokens.contains(t));
        let key_referenced = key_tokens.iter().any(|t| claim_tokens.contains(t));

        if value_present {
            supporting.push(record.id.clone());
        } else if key_referenced {
            // The claim talks about this fact type but not its stored value.
            conflicting = true;
        }
    }

    let verdict = if !supporting.is_empty() {
        Verdict::Supported
    } else if conflicting {
        Verdict::Unsupported
    } else {
        Verdict::Unknown
    };

    ConfidenceAnnotation {
        claim: claim.to_string(),
        verdict,
        supporting_records: supporting,
    }
}

/// Lowercased alphanumeric tokens, short stop-ish words dropped.
fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(|w| w.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::record::RecordKind;

    fn record(kind: RecordKind, key: &str, value: &str) -> ContextRecord {
        ContextRecord::new(kind, key, value)
    }

    #[test]
    fn supported_claim_names_its_records() {
        let context = vec![record(RecordKind::PersonalFact, "name", "Alex")];
        let annotations = validate("Your name is Alex.", &context);

        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].verdict, Verdict::Supported);
        assert_eq!(annotations[0].supporting_records, vec![context[0].id.clone()]);
    }

    #[test]
    fn conflicting_value_is_unsupported() {
        let context = vec![record(RecordKind::PersonalFact, "name", "Alex")];
        let annotations = validate("Your name is Sam.", &context);
        assert_eq!(annotations[0].verdict, Verdict::Unsupported);
        assert!(annotations[0].supporting_records.is_empty());
    }

    #[test]
    fn unrelated_claim_is_unknown() {
        let context = vec![record(RecordKind::PersonalFact, "name", "Alex")];
        let annotations = validate("The weather looks pleasant today.", &context);
        assert_eq!(annotations[0].verdict, Verdict::Unknown);
    }

    #[test]
    fn multi_sentence_replies_get_per_claim_verdicts() {
        let context = vec![record(RecordKind::PersonalFact, "name", "Alex")];
        let annotations = validate("Your name is Alex. You were born on Mars.", &context);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].verdict, Verdict::Supported);
        assert_eq!(annotations[1].verdict, Verdict::Unknown);
    }

    #[test]
    fn empty_context_yields_unknown_only() {
        let annotations = validate("You like hiking.", &[]);
        assert_eq!(annotations[0].verdict, Verdict::Unknown);
    }

    #[test]
    fn empty_reply_yields_no_annotations() {
        assert!(validate("", &[]).is_empty());
        assert!(validate("   ", &[]).is_empty());
    }

    #[test]
    fn multi_word_value_requires_all_tokens() {
        let context = vec![record(RecordKind::CalendarItem, "tomorrow", "dentist appointment")];
        let supported = validate("You have a dentist appointment.", &context);
        assert_eq!(supported[0].verdict, Verdict::Supported);

        let partial = validate("You have a dentist visit planned for tomorrow.", &context);
        assert_ne!(partial[0].verdict, Verdict::Supported);
    }
}
