// src/utils/slug.rs

use std::sync::LazyLock;

use regex::Regex;

/// Characters that are neither word characters, whitespace nor hyphens.
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid slug regex"));

/// Runs of hyphens and whitespace, collapsed into a single hyphen.
static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid slug regex"));

/// Turns free text into a URL and filename safe slug.
///
/// Non-ASCII characters are dropped, everything is lowercased, punctuation
/// is removed and whitespace/hyphen runs become a single `-`.
/// `Ada.Lovelace@Example.com` becomes `adalovelaceexamplecom`.
pub fn slugify(value: &str) -> String {
    let ascii: String = value.chars().filter(char::is_ascii).collect();
    let lowered = ascii.to_lowercase();
    let stripped = DISALLOWED.replace_all(&lowered, "");
    let joined = SEPARATORS.replace_all(&stripped, "-");
    joined.trim_matches(|c| c == '-' || c == '_').to_string()
}
