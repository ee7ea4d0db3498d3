use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Datelike;

use crate::model::Post;

/// `<dir>/<board>/<year>/<Y-M-D>_<id>.html`. The id after the last `_` is
/// what offline parsing reads back.
pub fn archive_path(dir: &Path, post: &Post) -> PathBuf {
    dir.join(&post.board)
        .join(post.published.year().to_string())
        .join(format!("{}_{}.html", post.published.format("%Y-%-m-%-d"), post.id))
}

pub async fn archive_article(dir: &Path, post: &Post, html: &str) -> Result<PathBuf> {
    let path = archive_path(dir, post);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(&path, html)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
