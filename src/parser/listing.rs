use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::article::element_text;
use crate::clock;

static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.r-ent, div.r-list-sep").unwrap());
static TITLE_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".title a").unwrap());
static PAGING_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a.btn.wide").unwrap());
static SLUG_TS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"M\.(\d{10})\.A").unwrap());
static INDEX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"index(\d+)\.html").unwrap());

const PREV_PAGE_LABEL: &str = "上頁";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub url: String,
    pub title: String,
    pub posted: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// In on-page order: oldest first.
    pub entries: Vec<ListingEntry>,
    /// Index of the page behind the "previous page" button, if enabled.
    pub prev_page: Option<u32>,
}

/// Parse one board index page.
///
/// Pinned posts sit after the `.r-list-sep` separator and are left out on
/// whatever page carries it; the site serves the newest page under its
/// numbered URL too. Deleted posts have no link and are skipped, as are
/// links whose slug carries no timestamp.
pub fn parse_listing(html: &str, base_url: &str) -> Listing {
    let doc = Html::parse_document(html);
    let mut entries = Vec::new();

    for row in doc.select(&ROW_SEL) {
        if row.value().classes().any(|c| c == "r-list-sep") {
            break;
        }
        if let Some(entry) = read_entry(row, base_url) {
            entries.push(entry);
        }
    }

    let prev_page = doc
        .select(&PAGING_SEL)
        .find(|a| element_text(*a).contains(PREV_PAGE_LABEL))
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| INDEX_RE.captures(href))
        .and_then(|c| c[1].parse().ok());

    Listing { entries, prev_page }
}

fn read_entry(row: ElementRef, base_url: &str) -> Option<ListingEntry> {
    let link = row.select(&TITLE_LINK_SEL).next()?;
    let href = link.value().attr("href")?;
    let Some(posted) = slug_timestamp(href) else {
        debug!("no timestamp in listing href {}", href);
        return None;
    };
    Some(ListingEntry {
        url: absolute_url(base_url, href),
        title: element_text(link).trim().to_string(),
        posted,
    })
}

/// Site-local post time from the Unix timestamp in `M.<secs>.A.<hex>`.
pub fn slug_timestamp(url: &str) -> Option<NaiveDateTime> {
    let secs = SLUG_TS_RE.captures(url)?[1].parse().ok()?;
    clock::site_time_from_unix(secs)
}

pub fn absolute_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href.trim_start_matches('/'))
    }
}
