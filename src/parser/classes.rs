use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::article::element_text;
use super::listing::absolute_url;
use crate::model::ClassNode;

static ENTRY_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".b-ent a").unwrap());
static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".board-name").unwrap());
static CLASS_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".board-class").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".board-title").unwrap());
static CLASS_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,10})").unwrap());

const BOARD_HREF_SUFFIX: &str = "/index.html";

/// One row of a `/cls/<id>` page: either a board or a nested class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassEntry {
    Board { name: String, class: String, title: String },
    Class { node: ClassNode, url: String },
}

pub fn parse_class_page(html: &str, base_url: &str) -> Vec<ClassEntry> {
    let doc = Html::parse_document(html);
    doc.select(&ENTRY_SEL)
        .filter_map(|a| read_entry(a, base_url))
        .collect()
}

fn read_entry(a: ElementRef, base_url: &str) -> Option<ClassEntry> {
    let href = a.value().attr("href")?;
    let name = field(a, &NAME_SEL);
    let class = field(a, &CLASS_SEL);
    let title = field(a, &TITLE_SEL);

    if href.ends_with(BOARD_HREF_SUFFIX) {
        return Some(ClassEntry::Board { name, class, title });
    }

    let id = CLASS_ID_RE.captures(href)?[1].to_string();
    Some(ClassEntry::Class {
        node: ClassNode { id, name, class, title },
        url: absolute_url(base_url, href),
    })
}

fn field(a: ElementRef, sel: &Selector) -> String {
    a.select(sel)
        .next()
        .map(|e| element_text(e).trim().to_string())
        .unwrap_or_default()
}
