use std::collections::{HashSet, VecDeque};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use super::fetch::PageFetcher;
use crate::model::{BoardMeta, ClassNode};
use crate::parser::classes::{parse_class_page, ClassEntry};
use crate::parser::listing::absolute_url;

/// Listed in the hierarchy but always 404s.
const UNCRAWLABLE_BOARD: &str = "ALLPOST";

/// A class page still to visit, with the path of classes leading to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClass {
    pub id: String,
    pub url: String,
    pub path: Vec<ClassNode>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Expansion {
    pub boards: Vec<BoardMeta>,
    pub classes: Vec<PendingClass>,
}

/// Turn one class page's entries into boards and child classes. Every
/// child gets its own copy of `path`, extended by itself.
pub fn expand(path: &[ClassNode], entries: Vec<ClassEntry>) -> Expansion {
    let mut out = Expansion::default();
    for entry in entries {
        match entry {
            ClassEntry::Board { name, .. } if name == UNCRAWLABLE_BOARD => {
                debug!("skipping {}", UNCRAWLABLE_BOARD);
            }
            ClassEntry::Board { name, class, title } => out.boards.push(BoardMeta {
                name,
                class,
                title,
                path: path.to_vec(),
            }),
            ClassEntry::Class { node, url } => {
                let mut child_path = path.to_vec();
                child_path.push(node.clone());
                out.classes.push(PendingClass {
                    id: node.id,
                    url,
                    path: child_path,
                });
            }
        }
    }
    out
}

/// Breadth-first walk of the class tree from `/cls/<root>`. Each class is
/// fetched once; a board listed under several classes keeps the first path
/// it was found by.
pub async fn discover_boards(
    fetcher: &dyn PageFetcher,
    base_url: &str,
    root: &str,
) -> Result<Vec<BoardMeta>> {
    let mut queue = VecDeque::from([PendingClass {
        id: root.to_string(),
        url: absolute_url(base_url, &format!("/cls/{}", root)),
        path: Vec::new(),
    }]);
    let mut seen_classes = HashSet::from([root.to_string()]);
    let mut seen_boards = HashSet::new();
    let mut boards = Vec::new();

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);

    while let Some(class) = queue.pop_front() {
        pb.set_message(format!("cls/{} | {} boards, {} queued", class.id, boards.len(), queue.len()));
        let page = match fetcher.fetch(&class.url).await {
            Ok(p) if p.status == 200 => p,
            Ok(p) => {
                warn!("{}: status {}", class.url, p.status);
                continue;
            }
            Err(e) => {
                warn!("{}: {:#}", class.url, e);
                continue;
            }
        };

        let expansion = expand(&class.path, parse_class_page(&page.body, base_url));
        for board in expansion.boards {
            if seen_boards.insert(board.name.clone()) {
                boards.push(board);
            }
        }
        for child in expansion.classes {
            if seen_classes.insert(child.id.clone()) {
                queue.push_back(child);
            }
        }
        pb.tick();
    }

    pb.finish_and_clear();
    info!("discovered {} boards across {} classes", boards.len(), seen_classes.len());
    Ok(boards)
}
