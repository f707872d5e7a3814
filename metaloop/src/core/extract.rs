//! Heuristic extraction of an executable fragment from free-form model text.
//!
//! Fenced regions are authoritative. Without fences, text that contains an
//! obvious statement marker is salvaged whole. Extraction is advisory: the
//! result is not guaranteed to be valid code.

use std::sync::LazyLock;

use regex::Regex;

/// Substrings that suggest unfenced text is already a script.
pub const CODE_MARKERS: &[&str] = &["print(", "import ", "open("];

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[\w+.\-]*[ \t]*\r?\n)?(.*?)```").expect("fence regex should be valid")
});

/// Extract code from `text`, or `None` if nothing looks executable.
///
/// The last fenced region wins: models often restate drafts before the final
/// answer.
pub fn extract_code(text: &str) -> Option<String> {
    if let Some(body) = FENCE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .last()
    {
        let code = body.as_str().trim();
        return (!code.is_empty()).then(|| code.to_string());
    }

    if CODE_MARKERS.iter().any(|marker| text.contains(marker)) {
        let code = text.trim();
        return (!code.is_empty()).then(|| code.to_string());
    }

    None
}
