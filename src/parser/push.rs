use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::article::{element_text, normalize_author};
use super::content::IPV4_RE;
use super::year::PartialStamp;
use crate::error::ExtractError;
use crate::model::{Comment, PushType};

static PUSH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.push").unwrap());
static TAG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".push-tag").unwrap());
static USER_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".push-userid").unwrap());
static CONTENT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".push-content").unwrap());
static IPDATETIME_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".push-ipdatetime").unwrap());
static PARTIAL_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,2}/\d{1,2}\s\d{1,2}:\d{1,2}").unwrap());

/// One push block, read but not yet placed in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPush {
    pub kind: PushType,
    pub author: String,
    pub content: String,
    pub ip: Option<String>,
    pub stamp: PartialStamp,
}

pub type PushOutcome = Result<RawPush, ExtractError>;

/// The `.push-ipdatetime` cell split into its two halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpTime {
    pub ip: Option<String>,
    pub time: Option<String>,
}

/// Every push block on the page, in page order.
pub fn read_pushes(doc: &Html) -> Vec<PushOutcome> {
    doc.select(&PUSH_SEL).map(read_push).collect()
}

fn read_push(el: ElementRef) -> PushOutcome {
    let split = split_ip_and_publish_time(&child_text(el, &IPDATETIME_SEL));
    if split.ip.is_none() && split.time.is_none() {
        return Err(ExtractError::RenderDuplicatePush);
    }

    let mark = child_text(el, &TAG_SEL);
    let kind = PushType::from_mark(&mark)
        .ok_or_else(|| ExtractError::UnknownPushTag(mark.trim().to_string()))?;
    let author = normalize_author(&child_text(el, &USER_SEL)).unwrap_or_default();
    let content = child_text(el, &CONTENT_SEL)
        .trim_start_matches([' ', ':'])
        .trim_end()
        .to_string();

    let raw = split.time.unwrap_or_default();
    let stamp = last_partial_date(&raw)
        .and_then(|s| s.parse::<PartialStamp>().ok())
        .ok_or_else(|| ExtractError::UnparseableCommentTime {
            author: author.clone(),
            raw: raw.clone(),
        })?;

    Ok(RawPush {
        kind,
        author,
        content,
        ip: split.ip,
        stamp,
    })
}

/// IP and timestamp share one cell: `" 111.71.127.174 11/06 22:04"`, but
/// either half may be missing (`"05/30 18:28"`, `"218.166.4.106 06/22"`).
pub fn split_ip_and_publish_time(raw: &str) -> IpTime {
    let raw = raw.trim();
    let (ip, rest) = match IPV4_RE.find_iter(raw).last() {
        Some(m) => (
            Some(m.as_str().to_string()),
            format!("{}{}", &raw[..m.start()], &raw[m.end()..]),
        ),
        None => (None, raw.to_string()),
    };
    let rest = rest.trim();
    IpTime {
        ip,
        time: if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        },
    }
}

pub fn last_partial_date(text: &str) -> Option<&str> {
    PARTIAL_DATE_RE.find_iter(text).last().map(|m| m.as_str())
}

/// Coalesce runs of adjacent comments by the same author into one, joining
/// their content. The first comment of each run keeps its other fields.
pub fn merge_consecutive(comments: &[Comment]) -> Vec<Comment> {
    let mut merged: Vec<Comment> = Vec::new();
    for c in comments {
        match merged.last_mut() {
            Some(prev) if prev.author == c.author => prev.content.push_str(&c.content),
            _ => merged.push(c.clone()),
        }
    }
    merged
}

fn child_text(el: ElementRef, sel: &Selector) -> String {
    el.select(sel).next().map(element_text).unwrap_or_default()
}
