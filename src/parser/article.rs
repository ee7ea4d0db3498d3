use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

static MAIN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#main-content").unwrap());
static META_TAG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".article-meta-tag").unwrap());
static BOARD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("#topbar a.board").unwrap());
static BOARD_URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/bbs/([^/]+)/").unwrap());

const PUBLISHED_FORMATS: &[&str] = &["%a %b %d %H:%M:%S %Y", "%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// The meta labels worth reading. Everything else (看板, …) is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaLabel {
    Author,
    Time,
    Title,
}

impl MetaLabel {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "作者" => Some(MetaLabel::Author),
            "時間" => Some(MetaLabel::Time),
            "標題" => Some(MetaLabel::Title),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MetaFields {
    pub author: Option<String>,
    pub published: Option<String>,
    pub title: Option<String>,
}

/// Read each recognized label's value from the node right after it.
pub fn meta_fields(doc: &Html) -> MetaFields {
    let mut fields = MetaFields::default();
    for tag in doc.select(&META_TAG_SEL) {
        let Some(label) = MetaLabel::from_label(&element_text(tag)) else {
            continue;
        };
        let value = tag
            .next_siblings()
            .find_map(ElementRef::wrap)
            .map(|v| element_text(v).trim().to_string());
        match label {
            MetaLabel::Author => fields.author = value,
            MetaLabel::Time => fields.published = value,
            MetaLabel::Title => fields.title = value,
        }
    }
    fields
}

/// `"accountid (nickname)"` → `"accountid"`.
pub fn normalize_author(raw: &str) -> Option<String> {
    raw.split('(')
        .next()
        .and_then(|head| head.split_whitespace().next())
        .map(str::to_string)
}

pub fn parse_published(raw: &str) -> Option<NaiveDateTime> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    PUBLISHED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
}

/// Plain text of the body container with meta spans and push blocks left out.
pub fn isolate_body(doc: &Html) -> Option<String> {
    let main = doc.select(&MAIN_SEL).next()?;
    let mut out = String::new();
    collect_text(main, &mut out);
    Some(out)
}

fn collect_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !is_excluded(child) {
                        collect_text(child, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_excluded(el: ElementRef) -> bool {
    let v = el.value();
    match v.name() {
        "span" => v.classes().any(|c| c.starts_with("article-meta-")),
        "div" => v.classes().any(|c| c == "push"),
        _ => false,
    }
}

/// Board name from the top bar (label span skipped), else from the URL.
pub fn board_name(doc: &Html, url: &str) -> Option<String> {
    doc.select(&BOARD_SEL)
        .next()
        .map(|a| {
            a.children()
                .filter_map(|c| c.value().as_text())
                .map(|t| &**t)
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .or_else(|| BOARD_URL_RE.captures(url).map(|c| c[1].to_string()))
}

/// Article slug from a URL (`…/M.1577805007.A.1F3.html`) or from a saved
/// file name (`2019-12-31_M.1577805007.A.1F3.html`).
pub fn article_id_from_url(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit(['/', '\\']).next()?;
    let stem = last.strip_suffix(".html").unwrap_or(last);
    let id = stem.rsplit('_').next().unwrap_or(stem);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

pub(crate) fn element_text(el: ElementRef) -> String {
    el.text().collect()
}
