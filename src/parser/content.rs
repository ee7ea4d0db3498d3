use std::sync::LazyLock;

use regex::Regex;

pub(crate) static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").unwrap());

/// Site-appended lines that are not part of what the author wrote.
const SIGNATURE_MARKERS: &[&str] = &["※ 發信站", "※ 文章網址", "※ 編輯"];
const CITATION_MARKER: &str = "※ 引述";
const QUOTED_LINE_PREFIX: &str = ": ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContent {
    pub content: String,
    pub quote: Option<String>,
}

/// Last IPv4-shaped token in `text`. The one nearest the signature block is
/// the posting IP; earlier ones are usually quoted from other posts.
pub fn last_ipv4(text: &str) -> Option<String> {
    IPV4_RE.find_iter(text).last().map(|m| m.as_str().to_string())
}

/// Signature removal followed by the quote split.
pub fn normalize(text: &str) -> NormalizedContent {
    split_quote(&strip_signature(text))
}

/// Drop signature lines, then trim surrounding blank lines and the `--` rule.
pub fn strip_signature(text: &str) -> String {
    text.lines()
        .filter(|line| {
            let line = line.trim_start();
            !SIGNATURE_MARKERS.iter().any(|m| line.starts_with(m))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches(|c: char| c == '\r' || c == '\n' || c == '-')
        .to_string()
}

/// Pull citation header and `: `-prefixed lines out into `quote`.
pub fn split_quote(text: &str) -> NormalizedContent {
    let mut body = Vec::new();
    let mut quoted = Vec::new();

    for line in text.lines() {
        if line.trim_start().starts_with(CITATION_MARKER) || line.starts_with(QUOTED_LINE_PREFIX) {
            quoted.push(line.trim_end());
        } else {
            body.push(line);
        }
    }

    let content = body
        .join("\n")
        .trim_matches(|c: char| c == '\r' || c == '\n' || c == ' ' || c == '-')
        .to_string();
    let quote = if quoted.is_empty() {
        None
    } else {
        Some(quoted.join("\n"))
    };

    NormalizedContent { content, quote }
}
