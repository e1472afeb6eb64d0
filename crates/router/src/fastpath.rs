//! Fast-path template matching.
//!
//! Templates are sequences of literal words and `{placeholder}` segments,
//! e.g. `"add {item} to {list}"`. Placeholders capture one or more words.
//! The registry rejects overlapping templates at registration time — two
//! templates overlap when some input string matches both — so matching
//! itself never has to resolve ambiguity: first match in registration order
//! is the only match.

use confab_core::classification::DeterministicAction;
use confab_core::error::TemplateError;
use confab_core::utterance::Utterance;

/// One token of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// A literal word, matched case-insensitively
    Literal(String),
    /// A named capture of one or more words
    Placeholder(String),
}

/// A parsed fast-path template bound to a handler name.
#[derive(Debug, Clone)]
pub struct Template {
    /// The template source text, kept for error messages
    pub source: String,

    /// The handler a match dispatches to
    pub handler: String,

    tokens: Vec<Token>,
}

impl Template {
    /// Parse a template. Rejected: empty templates, templates with no
    /// literal anchor, duplicate placeholder names, and adjacent
    /// placeholders (their boundary would be ambiguous).
    pub fn parse(source: &str, handler: &str) -> Result<Self, TemplateError> {
        let parse_err = |reason: &str| TemplateError::Parse {
            template: source.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = Vec::new();
        let mut names: Vec<String> = Vec::new();

        for word in source.split_whitespace() {
            if let Some(name) = word.strip_prefix('{').and_then(|w| w.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(parse_err("empty placeholder name"));
                }
                if names.iter().any(|n| n == name) {
                    return Err(parse_err("duplicate placeholder name"));
                }
                if matches!(tokens.last(), Some(Token::Placeholder(_))) {
                    return Err(parse_err("adjacent placeholders"));
                }
                names.push(name.to_string());
                tokens.push(Token::Placeholder(name.to_string()));
            } else {
                tokens.push(Token::Literal(normalize_word(word)));
            }
        }

        if tokens.is_empty() {
            return Err(parse_err("empty template"));
        }
        if !tokens.iter().any(|t| matches!(t, Token::Literal(_))) {
            return Err(parse_err("no literal words"));
        }

        Ok(Self {
            source: source.to_string(),
            handler: handler.to_string(),
            tokens,
        })
    }

    /// Match an input against this template, returning extracted arguments.
    ///
    /// A placeholder captures the minimal run of words before the next
    /// literal, which makes extraction deterministic.
    fn try_match(&self, words: &[&str]) -> Option<serde_json::Value> {
        let mut args = serde_json::Map::new();
        let mut w = 0usize;
        let mut t = 0usize;

        while t < self.tokens.len() {
            match &self.tokens[t] {
                Token::Literal(lit) => {
                    if w >= words.len() || words[w] != lit {
                        return None;
                    }
                    w += 1;
                    t += 1;
                }
                Token::Placeholder(name) => {
                    // Capture up to the next literal (or end of template).
                    let stop = self.tokens.get(t + 1).and_then(|next| match next {
                        Token::Literal(lit) => Some(lit.as_str()),
                        Token::Placeholder(_) => None, // rejected at parse
                    });

                    let start = w;
                    match stop {
                        Some(lit) => {
                            while w < words.len() && words[w] != lit {
                                w += 1;
                            }
                            if w == start || w >= words.len() {
                                return None;
                            }
                        }
                        None => {
                            w = words.len();
                            if w == start {
                                return None;
                            }
                        }
                    }
                    args.insert(
                        name.clone(),
                        serde_json::Value::String(words[start..w].join(" ")),
                    );
                    t += 1;
                }
            }
        }

        if w == words.len() {
            Some(serde_json::Value::Object(args))
        } else {
            None
        }
    }

    /// Can any input string match both templates?
    ///
    /// Treats literals as fixed symbols and placeholders as "one or more
    /// arbitrary words" and checks language intersection with a memoized
    /// walk over both token sequences.
    fn overlaps(&self, other: &Template) -> bool {
        fn walk(a: &[Token], b: &[Token], i: usize, j: usize, memo: &mut Vec<Option<bool>>, cols: usize) -> bool {
            let idx = i * cols + j;
            if let Some(hit) = memo[idx] {
                return hit;
            }
            let result = match (a.get(i), b.get(j)) {
                (None, None) => true,
                (None, Some(_)) | (Some(_), None) => false,
                (Some(Token::Literal(x)), Some(Token::Literal(y))) => {
                    x == y && walk(a, b, i + 1, j + 1, memo, cols)
                }
                (Some(Token::Placeholder(_)), Some(Token::Literal(_))) => {
                    // The placeholder absorbs the literal's word, then either
                    // side advances.
                    walk(a, b, i + 1, j + 1, memo, cols) || walk(a, b, i, j + 1, memo, cols)
                }
                (Some(Token::Literal(_)), Some(Token::Placeholder(_))) => {
                    walk(a, b, i + 1, j + 1, memo, cols) || walk(a, b, i + 1, j, memo, cols)
                }
                (Some(Token::Placeholder(_)), Some(Token::Placeholder(_))) => {
                    walk(a, b, i + 1, j + 1, memo, cols)
                        || walk(a, b, i, j + 1, memo, cols)
                        || walk(a, b, i + 1, j, memo, cols)
                }
            };
            memo[idx] = Some(result);
            result
        }

        let cols = other.tokens.len() + 1;
        let mut memo = vec![None; (self.tokens.len() + 1) * cols];
        walk(&self.tokens, &other.tokens, 0, 0, &mut memo, cols)
    }
}

/// Lowercase and strip leading/trailing punctuation from one word.
fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| c.is_ascii_punctuation() && c != '{' && c != '}')
        .to_lowercase()
}

/// Split an utterance into normalized words.
fn normalize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(normalize_word)
        .filter(|w| !w.is_empty())
        .collect()
}

/// The canonical, conflict-checked fast-path registry.
///
/// Templates are matched in registration order; the overlap check at
/// registration guarantees at most one can match any input.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template for a handler. Fails if the template does not
    /// parse or if some input could match both it and an existing template.
    pub fn register(&mut self, source: &str, handler: &str) -> Result<(), TemplateError> {
        let template = Template::parse(source, handler)?;
        for existing in &self.templates {
            if existing.overlaps(&template) {
                return Err(TemplateError::Overlap {
                    first: existing.source.clone(),
                    second: template.source.clone(),
                });
            }
        }
        tracing::debug!(template = %template.source, handler = %template.handler, "fast-path template registered");
        self.templates.push(template);
        Ok(())
    }

    /// Match an utterance against the registry.
    ///
    /// Deterministic: depends only on the utterance text, never on
    /// conversation state. Returns the handler and the extracted argument
    /// payload of the first (and only possible) matching template.
    pub fn classify_fast(&self, utterance: &Utterance) -> Option<DeterministicAction> {
        let words = normalize(&utterance.text);
        let words: Vec<&str> = words.iter().map(|s| s.as_str()).collect();
        if words.is_empty() {
            return None;
        }

        for template in &self.templates {
            if let Some(args) = template.try_match(&words) {
                tracing::debug!(template = %template.source, handler = %template.handler, "fast-path hit");
                return Some(DeterministicAction {
                    handler: template.handler.clone(),
                    args,
                });
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// The default template set: list writes, fact storage, and reminders.
/// Kept deliberately small — anything not trivially deterministic (fact
/// recall included, which wants assembled context) belongs behind the
/// router.
pub fn default_registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    for (source, handler) in [
        ("add {item} to {list} list", "list-write"),
        ("remember that my {key} is {value}", "memory-write"),
        ("remind me to {task} at {time}", "calendar-write"),
    ] {
        if let Err(err) = registry.register(source, handler) {
            tracing::error!(error = %err, "built-in fast-path template rejected");
        }
    }
    registry
}
