//! Executable markup stripping.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());

// Unterminated or stray script tags left after block removal.
static SCRIPT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?script\b[^>]*>?").unwrap());

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z][^<>]*>").unwrap());

static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)[\s/]+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});

static SCRIPT_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:javascript|vbscript)\s*:").unwrap());

/// Remove script blocks, inline event-handler attributes and script URIs.
///
/// Everything else, including ordinary angle brackets in code, is preserved.
///
/// ```
/// use diagnose::request::strip_markup;
///
/// let cleaned = strip_markup(r#"<a href="javascript:alert(1)" onclick="x()">link</a>"#);
/// assert_eq!(cleaned, r#"<a href="alert(1)">link</a>"#);
/// ```
pub fn strip_markup(text: &str) -> String {
    // A removal can splice its neighbours into a new tag, so repeat until
    // stable. Every pass only deletes, which bounds the loop.
    let mut current = strip_once(text);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(text, "");
    let text = SCRIPT_TAG.replace_all(&text, "");
    let text = TAG.replace_all(&text, |caps: &Captures| {
        EVENT_HANDLER.replace_all(&caps[0], "").into_owned()
    });
    SCRIPT_URI.replace_all(&text, "").into_owned()
}
