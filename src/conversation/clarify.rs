//! Deterministic "ask before answering" heuristics.
//!
//! A conversational message gets follow-up questions instead of a backend
//! call only when it is very short or matches a known-ambiguous symptom
//! without identifying detail. Factual and time-sensitive questions, and
//! messages that already carry error detail, always go to a backend.

use super::extract::{CATEGORY, DEVICE_TYPE, ERROR_CODE, OS, VENDOR};
use super::ContextMap;

const MIN_WORDS: usize = 4;
const MAX_QUESTIONS: usize = 4;

const FACTUAL_PREFIXES: &[&str] = &[
    "what is", "what's", "what are", "who ", "when ", "where ", "why does", "how many",
    "how much", "define ", "explain ", "difference between",
];

const TIME_SENSITIVE: &[&str] = &[
    "latest", "today", "tonight", "yesterday", "tomorrow", "current", "currently", "this week",
    "price", "release date", "news", "outage",
];

const ERROR_DETAIL_MARKERS: &[&str] = &[
    "error:", "exception", "traceback", "stack trace", "panicked", "segfault", "undefined",
    "null", "#ref!", "#value!", "#n/a", "()", "::", "=>", "`",
];

const AMBIGUOUS_SYMPTOMS: &[&str] = &[
    "won't connect",
    "can't connect",
    "cannot connect",
    "not connecting",
    "no internet",
    "not working",
    "doesn't work",
    "does not work",
    "stopped working",
    "won't turn on",
    "won't start",
    "won't boot",
    "is slow",
    "so slow",
    "running slow",
    "keeps crashing",
    "is broken",
    "it broke",
];

fn is_factual_or_time_sensitive(lower: &str) -> bool {
    FACTUAL_PREFIXES.iter().any(|p| lower.starts_with(p))
        || TIME_SENSITIVE.iter().any(|w| lower.contains(w))
}

fn has_error_detail(lower: &str, known: &ContextMap) -> bool {
    known.contains_key(ERROR_CODE) || ERROR_DETAIL_MARKERS.iter().any(|m| lower.contains(m))
}

fn is_disambiguated(known: &ContextMap) -> bool {
    known.contains_key(VENDOR) && (known.contains_key(OS) || known.contains_key(ERROR_CODE))
}

/// Questions to ask instead of answering, or `None` to answer now.
///
/// `known` is the session context after merging the current message.
pub fn follow_up_questions(text: &str, known: &ContextMap) -> Option<Vec<String>> {
    let lower = text.trim().to_lowercase();
    if is_factual_or_time_sensitive(&lower) || has_error_detail(&lower, known) {
        return None;
    }

    let too_short = lower.split_whitespace().count() < MIN_WORDS;
    let ambiguous = AMBIGUOUS_SYMPTOMS.iter().any(|s| lower.contains(s));
    if !(too_short || ambiguous) || is_disambiguated(known) {
        return None;
    }

    let mut questions = Vec::new();
    if too_short && !known.contains_key(CATEGORY) {
        questions.push(
            "Can you describe what you were trying to do and what happened instead?".to_string(),
        );
    }

    let device = known.get(DEVICE_TYPE).map(String::as_str);
    match device {
        None => questions.push(
            "Which device is this happening on (laptop, phone, printer, router, ...)?".to_string(),
        ),
        Some(device) if !known.contains_key(VENDOR) => {
            questions.push(format!("What make and model is the {}?", device));
        }
        Some(_) => {}
    }
    if device.is_some() && !known.contains_key(OS) {
        questions.push("Which operating system and version is it running?".to_string());
    }

    match known.get(CATEGORY).map(String::as_str) {
        Some("network") => questions.push(
            "Is the problem with Wi-Fi, Ethernet or Bluetooth, and do other devices connect normally?"
                .to_string(),
        ),
        Some("hardware") => questions.push(
            "When did this start, and did anything happen just before (a drop, a spill, an update)?"
                .to_string(),
        ),
        Some("software") => {
            questions.push("Which application and version is affected?".to_string())
        }
        Some("printing") => questions.push(
            "Is the printer connected by USB or over the network, and does a test page print?"
                .to_string(),
        ),
        _ => {}
    }

    questions.push("Do you see an error message or code? If so, please paste it exactly.".to_string());
    questions.truncate(MAX_QUESTIONS);
    Some(questions)
}
