//! Request Normalizer/Validator.
//!
//! Turns a raw caller submission into an immutable [`RequestContext`]:
//! rejects empty, non-textual or too-short input, strips executable markup,
//! and truncates oversized text instead of failing.

mod sanitize;

pub use sanitize::strip_markup;

use crate::config::InputConfig;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_REFERENCES: usize = 5;
const MAX_REFERENCE_EXCERPT: usize = 500;

/// Input validation failures. Always the caller's fault; never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Request text is empty")]
    Empty,

    #[error("Request text must contain readable text")]
    NonTextual,

    #[error("Request text is too short ({actual} characters, minimum {min})")]
    TooShort { min: usize, actual: usize },

    #[error("Caller identifier is required")]
    MissingCaller,
}

/// Optional structured context attached by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredContext {
    pub code_snippet: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Natural language of the request, e.g. "en".
    pub language: Option<String>,
    pub programming_language: Option<String>,
    pub category: Option<String>,
}

/// Externally fetched reference material, used only on tiers with lookup enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSnippet {
    pub title: String,
    pub url: String,
    pub excerpt: String,
}

/// Submission as received from the route layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRequest {
    pub caller_id: String,
    pub tier: String,
    pub text: String,
    pub context: Option<StructuredContext>,
    pub conversation_id: Option<String>,
    pub references: Vec<ReferenceSnippet>,
}

impl RawRequest {
    pub fn new(caller_id: impl Into<String>, tier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            tier: tier.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: StructuredContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_references(mut self, references: Vec<ReferenceSnippet>) -> Self {
        self.references = references;
        self
    }
}

/// Normalized, immutable request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    text: String,
    context: StructuredContext,
    caller_id: String,
    tier: Tier,
    conversation_id: Option<String>,
    references: Vec<ReferenceSnippet>,
    truncated: bool,
}

impl RequestContext {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn context(&self) -> &StructuredContext {
        &self.context
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn references(&self) -> &[ReferenceSnippet] {
        &self.references
    }

    /// Whether the text was cut to the configured maximum.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Validates and normalizes raw submissions.
#[derive(Debug, Clone, Default)]
pub struct RequestNormalizer {
    config: InputConfig,
}

impl RequestNormalizer {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, raw: RawRequest) -> Result<RequestContext, InputError> {
        let caller_id = raw.caller_id.trim().to_string();
        if caller_id.is_empty() {
            return Err(InputError::MissingCaller);
        }

        let text = raw.text.trim();
        if text.is_empty() {
            return Err(InputError::Empty);
        }
        if !is_textual(text) {
            return Err(InputError::NonTextual);
        }

        let cleaned = strip_markup(text);
        let cleaned = cleaned.trim();
        let actual = cleaned.chars().count();
        if actual < self.config.min_length {
            return Err(InputError::TooShort {
                min: self.config.min_length,
                actual,
            });
        }

        let (text, truncated) = truncate_chars(cleaned, self.config.max_length);
        if truncated {
            tracing::info!(
                caller_id = %caller_id,
                original_chars = actual,
                max_chars = self.config.max_length,
                "Request text truncated"
            );
        }

        let mut context = raw.context.unwrap_or_default();
        if let Some(snippet) = context.code_snippet.take() {
            let (snippet, _) = truncate_chars(snippet.trim(), self.config.max_length);
            if !snippet.is_empty() {
                context.code_snippet = Some(snippet);
            }
        }

        let references = raw
            .references
            .into_iter()
            .filter(|r| !r.excerpt.trim().is_empty())
            .take(MAX_REFERENCES)
            .map(|r| ReferenceSnippet {
                title: strip_markup(&r.title),
                url: r.url,
                excerpt: truncate_chars(&strip_markup(&r.excerpt), MAX_REFERENCE_EXCERPT).0,
            })
            .collect();

        Ok(RequestContext {
            text,
            context,
            caller_id,
            tier: Tier::resolve(&raw.tier),
            conversation_id: raw
                .conversation_id
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            references,
            truncated,
        })
    }
}

/// Rejects binary payloads and strings made only of punctuation or control codes.
fn is_textual(text: &str) -> bool {
    if text.contains('\0') {
        return false;
    }
    let total = text.chars().count();
    let control = text
        .chars()
        .filter(|c| c.is_control() && !c.is_whitespace())
        .count();
    if control * 10 > total {
        return false;
    }
    text.chars().any(char::is_alphanumeric)
}

fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> RequestNormalizer {
        RequestNormalizer::default()
    }

    #[test]
    fn test_normalize_valid_request() {
        let ctx = normalizer()
            .normalize(RawRequest::new("user-1", "pro", "  undefined is not a function  "))
            .unwrap();
        assert_eq!(ctx.text(), "undefined is not a function");
        assert_eq!(ctx.caller_id(), "user-1");
        assert_eq!(ctx.tier(), Tier::Pro);
        assert!(!ctx.truncated());
    }

    #[test]
    fn test_normalize_empty() {
        let err = normalizer()
            .normalize(RawRequest::new("user-1", "free", "   \n\t "))
            .unwrap_err();
        assert_eq!(err, InputError::Empty);
    }

    #[test]
    fn test_normalize_too_short() {
        let err = normalizer()
            .normalize(RawRequest::new("user-1", "free", "help me"))
            .unwrap_err();
        assert_eq!(err, InputError::TooShort { min: 10, actual: 7 });
    }

    #[test]
    fn test_normalize_non_textual() {
        let n = normalizer();
        assert_eq!(
            n.normalize(RawRequest::new("u", "free", "!!!!!!!!!!!!????")).unwrap_err(),
            InputError::NonTextual
        );
        assert_eq!(
            n.normalize(RawRequest::new("u", "free", "abc\0defghijkl")).unwrap_err(),
            InputError::NonTextual
        );
        assert_eq!(
            n.normalize(RawRequest::new("u", "free", "\u{1}\u{2}\u{3}\u{4}ab\u{5}\u{6}"))
                .unwrap_err(),
            InputError::NonTextual
        );
    }

    #[test]
    fn test_normalize_missing_caller() {
        let err = normalizer()
            .normalize(RawRequest::new("  ", "free", "a perfectly fine question"))
            .unwrap_err();
        assert_eq!(err, InputError::MissingCaller);
    }

    #[test]
    fn test_normalize_truncates_long_text() {
        let n = RequestNormalizer::new(InputConfig {
            min_length: 10,
            max_length: 50,
        });
        let ctx = n
            .normalize(RawRequest::new("u", "free", "é".repeat(120)))
            .unwrap();
        assert_eq!(ctx.text().chars().count(), 50);
        assert!(ctx.truncated());
    }

    #[test]
    fn test_normalize_markup_only_is_too_short() {
        let err = normalizer()
            .normalize(RawRequest::new("u", "free", "<script>alert('hello world')</script>"))
            .unwrap_err();
        assert!(matches!(err, InputError::TooShort { .. }));
    }

    #[test]
    fn test_normalize_unknown_tier_fails_closed() {
        let ctx = normalizer()
            .normalize(RawRequest::new("u", "superuser", "my build fails with E0382"))
            .unwrap();
        assert_eq!(ctx.tier(), Tier::Free);
    }

    #[test]
    fn test_normalize_blank_conversation_id_dropped() {
        let ctx = normalizer()
            .normalize(RawRequest::new("u", "pro", "my build fails with E0382").with_conversation("  "))
            .unwrap();
        assert_eq!(ctx.conversation_id(), None);
    }

    #[test]
    fn test_normalize_bounds_references() {
        let refs = (0..8)
            .map(|i| ReferenceSnippet {
                title: format!("doc {}", i),
                url: format!("https://docs.example.com/{}", i),
                excerpt: "x".repeat(900),
            })
            .collect();
        let ctx = normalizer()
            .normalize(RawRequest::new("u", "pro", "my build fails with E0382").with_references(refs))
            .unwrap();
        assert_eq!(ctx.references().len(), MAX_REFERENCES);
        assert!(ctx
            .references()
            .iter()
            .all(|r| r.excerpt.chars().count() == MAX_REFERENCE_EXCERPT));
    }

    #[test]
    fn test_truncate_chars_boundary() {
        assert_eq!(truncate_chars("abc", 3), ("abc".to_string(), false));
        assert_eq!(truncate_chars("abcd", 3), ("abc".to_string(), true));
    }
}
