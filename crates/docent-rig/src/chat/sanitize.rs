//! Query sanitization against prompt injection.

use std::sync::LazyLock;

use regex::Regex;

/// Longest query passed on, in characters.
pub const MAX_QUERY_CHARACTERS: usize = 2000;

const FILTERED: &str = "[FILTERED]";
const TRUNCATED: &str = "... [TRUNCATED]";

static INJECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"ignore\s+previous\s+instructions",
        r"forget\s+everything",
        r"new\s+instructions?:",
        r"system\s*:",
        r"assistant\s*:",
        r"user\s*:",
        r"<\s*thinking\s*>",
        r"</\s*thinking\s*>",
        r#"".*system.*""#,
        r#"".*instructions.*""#,
    ]
    .into_iter()
    .map(|pattern| Regex::new(&format!("(?i){pattern}")).expect("valid injection pattern"))
    .collect()
});

static SPECIAL_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>{}"\[\]]{3,}"#).expect("valid special character pattern"));

/// Rewrites known injection phrases and runs of markup characters to
/// `[FILTERED]`, then caps the length.
///
/// The result may be empty only if the input was blank.
pub fn sanitize_query(query: &str) -> String {
    let mut sanitized = query.to_string();
    for pattern in INJECTION_PATTERNS.iter() {
        sanitized = pattern.replace_all(&sanitized, FILTERED).into_owned();
    }
    sanitized = SPECIAL_RUNS.replace_all(&sanitized, FILTERED).into_owned();

    if let Some((cut, _)) = sanitized.char_indices().nth(MAX_QUERY_CHARACTERS) {
        sanitized.truncate(cut);
        sanitized.push_str(TRUNCATED);
    }

    sanitized.trim().to_string()
}
