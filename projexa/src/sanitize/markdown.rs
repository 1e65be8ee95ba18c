// Context-free markdown rewrites applied to text outside code fences.

use std::sync::LazyLock;

use regex::Regex;

/// `[label](url)` -> `label`
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("link pattern is valid"));

/// 1-6 `#` at the start of a line, plus following whitespace.
static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s*").expect("heading pattern is valid"));

/// `-`, `*`, `+` or `N.` at the start of a line (optionally indented),
/// plus following whitespace.
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:[-*+]|\d+\.)\s+").expect("list pattern is valid")
});

/// Apply the link, heading and list rewrites, in that order.
pub fn strip_markdown(text: &str) -> String {
    let text = LINK.replace_all(text, "${1}");
    let text = HEADING.replace_all(&text, "");
    LIST_ITEM.replace_all(&text, "").into_owned()
}
