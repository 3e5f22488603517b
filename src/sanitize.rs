//! Removal of markup from user-supplied text before it is persisted.
//!
//! The filter runs in four passes: whole script-like elements (tag and body)
//! are dropped, remaining tags are stripped, stray angle brackets are removed,
//! and control characters other than newline, carriage return and tab are
//! removed. Every pass only deletes characters, so the output is never longer
//! than the input and length bounds checked before sanitizing still hold.

use regex::Regex;
use std::sync::LazyLock;

/// `<script>`, `<style>`, `<iframe>` and `<object>` elements including their content.
static EMBEDDED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:script|style|iframe|object)\b[^>]*>.*?</(?:script|style|iframe|object)\s*>")
        .expect("embedded block pattern is valid")
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Returns `value` with markup removed.
///
/// # Examples
///
/// ```
/// # use tv_catalog::sanitize::sanitize;
/// assert_eq!("Breaking Bad", sanitize("<b>Breaking</b> Bad<script>alert(1)</script>"));
/// ```
pub fn sanitize(value: &str) -> String {
    let without_blocks = EMBEDDED_BLOCK.replace_all(value, "");
    let without_tags = HTML_TAG.replace_all(&without_blocks, "");

    without_tags
        .chars()
        .filter(|c| *c != '<' && *c != '>')
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect()
}

/// Sanitizes an optional field in place. `None` stays `None`.
pub fn sanitize_optional(value: Option<String>) -> Option<String> {
    value.map(|s| sanitize(&s))
}
