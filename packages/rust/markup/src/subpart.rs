//! Subpart grouping heuristics over heading text.
//!
//! Headings like "Subpart M—Fall Protection" carry the grouping for every
//! section beneath them. Corpus headings vary in dash style and occasionally
//! omit the title entirely, so the matching stays permissive.

use std::sync::LazyLock;

use regex::Regex;

use regsync_shared::SubpartInfo;

/// Matches `Subpart <letter> <dash> <title>`, tolerating hyphen, en-dash,
/// and em-dash separators.
static TITLED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Subpart\s+([A-Z]{1,2})\s*[\u{2014}\u{2013}-]\s*(.*)").expect("titled regex")
});

/// Matches a bare `Subpart <letter>` with no title.
static BARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Subpart\s+([A-Z]{1,2})").expect("bare regex"));

/// Strips the `Subpart <letter><sep>` prefix when deriving a title.
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Subpart\s+[A-Z]{1,2}\s*[\u{2014}\u{2013}-]?\s*").expect("prefix regex")
});

/// Derive a subpart grouping from heading text.
///
/// Rules, in order:
/// 1. `Subpart <letter> <dash> <title>` → letter + title.
/// 2. Bare `Subpart <letter>` → letter + whatever follows the prefix,
///    defaulting to a synthesized `Subpart <letter>` title.
/// 3. No match → `None`; callers inherit the enclosing grouping.
pub fn extract_subpart_info(heading: &str) -> Option<SubpartInfo> {
    if let Some(caps) = TITLED_RE.captures(heading) {
        return Some(SubpartInfo {
            letter: caps[1].to_uppercase(),
            title: caps[2].trim().to_string(),
        });
    }

    if let Some(caps) = BARE_RE.captures(heading) {
        let letter = caps[1].to_uppercase();
        let stripped = PREFIX_RE.replace(heading, "").trim().to_string();
        let title = if stripped.is_empty() {
            format!("Subpart {letter}")
        } else {
            stripped
        };
        return Some(SubpartInfo { letter, title });
    }

    None
}
