//! Deterministic cache keys.

use crate::request::RequestContext;
use sha2::{Digest, Sha256};

/// Digest of the tier, the case-folded whitespace-collapsed text and the
/// request classifiers.
///
/// Exact repeats (modulo case and spacing) share a key; anything that can
/// change the prompt sent to a backend changes the key.
pub fn cache_key(request: &RequestContext) -> String {
    let ctx = request.context();
    let mut hasher = Sha256::new();

    let mut field = |name: &str, value: &str| {
        hasher.update(name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(value.as_bytes());
        hasher.update([0x1e]);
    };

    field("tier", request.tier().as_str());
    field("text", &fold(request.text()));
    field("category", &fold(ctx.category.as_deref().unwrap_or_default()));
    field("language", &fold(ctx.language.as_deref().unwrap_or_default()));
    field(
        "programming_language",
        &fold(ctx.programming_language.as_deref().unwrap_or_default()),
    );
    field("code", &fold(ctx.code_snippet.as_deref().unwrap_or_default()));
    for reference in request.references() {
        field("reference", &reference.url);
    }

    format!("{:x}", hasher.finalize())
}

fn fold(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
