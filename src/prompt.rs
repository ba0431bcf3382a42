//! Prompt construction.
//!
//! Every backend receives the same provider-neutral [`PromptPayload`]: one
//! system instruction describing the JSON answer format, followed by the
//! conversation so far and the current request. Adapters translate it to
//! their wire format.

use crate::conversation::extract::CATEGORY;
use crate::conversation::{ContextMap, Role, Turn};
use crate::request::RequestContext;
use crate::tier::FeatureFlags;
use serde::Serialize;
use std::fmt::Write;

const SYSTEM_PROMPT: &str = "\
You are a senior support engineer. Diagnose the user's problem and answer with a \
single JSON object and nothing else, using exactly these keys:
  \"explanation\": what is going wrong and why (plain language, at least two sentences),
  \"solution\": concrete numbered steps the user can follow,
  \"code_example\": a code or formula example when it helps, otherwise null,
  \"category\": one of programming, spreadsheet, network, printing, account, hardware, software, general,
  \"tags\": up to five short lower-case keywords,
  \"confidence\": a number between 0 and 1,
  \"severity\": one of low, medium, high, critical.
Do not invent product names, versions or error codes that the user did not mention.";

/// One message of the prompt. `Role::User` or `Role::Assistant`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// Provider-neutral prompt handed to every adapter in the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptPayload {
    pub system: String,
    /// Alternating history ending with the current user message.
    pub messages: Vec<PromptMessage>,
    /// Best guess at the problem category, used by the terminal fallback.
    pub category_hint: Option<String>,
}

impl PromptPayload {
    /// Single-shot prompt for `request`.
    pub fn for_request(request: &RequestContext, features: FeatureFlags) -> Self {
        Self::build(request, features, &[], &ContextMap::new())
    }

    /// Prompt with prior turns and accumulated session context.
    ///
    /// `history` must not contain the current message; follow-up turns are
    /// kept so the backend sees what was already asked.
    pub fn build(
        request: &RequestContext,
        features: FeatureFlags,
        history: &[Turn],
        known: &ContextMap,
    ) -> Self {
        let mut messages: Vec<PromptMessage> = history
            .iter()
            .map(|turn| PromptMessage {
                role: turn.role,
                content: turn.content.clone(),
            })
            .collect();

        messages.push(PromptMessage {
            role: Role::User,
            content: user_message(request, features, known),
        });

        let category_hint = request
            .context()
            .category
            .clone()
            .or_else(|| known.get(CATEGORY).cloned());

        Self {
            system: SYSTEM_PROMPT.to_string(),
            messages: merge_consecutive(messages),
            category_hint,
        }
    }

    /// Content of the final user message.
    pub fn last_user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// Rough size in characters, for logging.
    pub fn char_len(&self) -> usize {
        self.system.chars().count()
            + self
                .messages
                .iter()
                .map(|m| m.content.chars().count())
                .sum::<usize>()
    }
}

fn user_message(request: &RequestContext, features: FeatureFlags, known: &ContextMap) -> String {
    let ctx = request.context();
    let mut out = String::new();

    let _ = writeln!(out, "Problem:\n{}", request.text());

    if let Some(code) = ctx.code_snippet.as_deref() {
        let lang = ctx.programming_language.as_deref().unwrap_or_default();
        let _ = writeln!(out, "\nCode:\n```{}\n{}\n```", lang, code);
    }

    let mut details = Vec::new();
    if let Some(file) = ctx.file.as_deref() {
        match ctx.line {
            Some(line) => details.push(format!("file: {}:{}", file, line)),
            None => details.push(format!("file: {}", file)),
        }
    }
    if let Some(lang) = ctx.programming_language.as_deref() {
        details.push(format!("programming language: {}", lang));
    }
    if let Some(category) = ctx.category.as_deref() {
        details.push(format!("category: {}", category));
    }
    for (key, value) in known {
        details.push(format!("{}: {}", key.replace('_', " "), value));
    }
    if !details.is_empty() {
        let _ = writeln!(out, "\nKnown details:");
        for detail in details {
            let _ = writeln!(out, "- {}", detail);
        }
    }

    if features.reference_lookup && !request.references().is_empty() {
        let _ = writeln!(out, "\nReference material (may be partially relevant):");
        for (i, reference) in request.references().iter().enumerate() {
            let _ = writeln!(
                out,
                "[{}] {} <{}>\n{}",
                i + 1,
                reference.title,
                reference.url,
                reference.excerpt
            );
        }
    }

    if let Some(language) = ctx.language.as_deref() {
        let _ = writeln!(out, "\nAnswer in the language with code '{}'.", language);
    }

    out.trim_end().to_string()
}

/// Providers reject two consecutive messages with the same role.
fn merge_consecutive(messages: Vec<PromptMessage>) -> Vec<PromptMessage> {
    let mut merged: Vec<PromptMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        match merged.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&message.content);
            }
            _ => merged.push(message),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RawRequest, ReferenceSnippet, RequestNormalizer, StructuredContext};

    fn request(raw: RawRequest) -> RequestContext {
        RequestNormalizer::default().normalize(raw).unwrap()
    }

    fn with_refs() -> RequestContext {
        request(
            RawRequest::new("u", "pro", "VLOOKUP returns #N/A for every row").with_references(
                vec![ReferenceSnippet {
                    title: "VLOOKUP function".to_string(),
                    url: "https://example.com/vlookup".to_string(),
                    excerpt: "Use FALSE for an exact match.".to_string(),
                }],
            ),
        )
    }

    #[test]
    fn test_single_shot_prompt() {
        let ctx = request(
            RawRequest::new("u", "free", "undefined is not a function").with_context(
                StructuredContext {
                    code_snippet: Some("foo.bar()".to_string()),
                    programming_language: Some("javascript".to_string()),
                    ..Default::default()
                },
            ),
        );
        let prompt = PromptPayload::for_request(&ctx, FeatureFlags::default());

        assert!(prompt.system.contains("\"explanation\""));
        assert_eq!(prompt.messages.len(), 1);
        let text = prompt.last_user_text();
        assert!(text.starts_with("Problem:\nundefined is not a function"));
        assert!(text.contains("```javascript\nfoo.bar()\n```"));
        assert!(text.contains("- programming language: javascript"));
    }

    #[test]
    fn test_references_only_with_lookup_flag() {
        let ctx = with_refs();

        let without = PromptPayload::for_request(&ctx, FeatureFlags::default());
        assert!(!without.last_user_text().contains("Reference material"));

        let flags = FeatureFlags {
            reference_lookup: true,
            ..Default::default()
        };
        let with = PromptPayload::for_request(&ctx, flags);
        assert!(with.last_user_text().contains("[1] VLOOKUP function <https://example.com/vlookup>"));
        assert!(with.last_user_text().contains("exact match"));
    }

    #[test]
    fn test_history_and_known_context() {
        let ctx = request(RawRequest::new("u", "pro", "it is a Dell running Windows 11"));
        let history = vec![
            Turn::user("my laptop won't connect"),
            Turn::follow_up("What make and model is the laptop?"),
        ];
        let known = ContextMap::from([
            ("device_type".to_string(), "laptop".to_string()),
            ("category".to_string(), "network".to_string()),
        ]);
        let prompt = PromptPayload::build(&ctx, FeatureFlags::default(), &history, &known);

        assert_eq!(prompt.messages.len(), 3);
        assert_eq!(prompt.messages[0].role, Role::User);
        assert_eq!(prompt.messages[1].role, Role::Assistant);
        assert!(prompt.last_user_text().contains("- device type: laptop"));
        assert_eq!(prompt.category_hint.as_deref(), Some("network"));
    }

    #[test]
    fn test_consecutive_roles_are_merged() {
        let ctx = request(RawRequest::new("u", "pro", "and now it also freezes on boot"));
        let history = vec![Turn::user("my laptop is slow")];
        let prompt = PromptPayload::build(&ctx, FeatureFlags::default(), &history, &ContextMap::new());

        assert_eq!(prompt.messages.len(), 1);
        assert!(prompt.messages[0].content.starts_with("my laptop is slow\n\nProblem:"));
    }
}
