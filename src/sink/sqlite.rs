use std::path::PathBuf;

use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

use super::keys::PostKey;
use super::{Destination, Sink};
use crate::db;
use crate::model::{Comment, Post};

const BATCH_SIZE: usize = 500;

/// All boards share one database file; each board gets its own connection.
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteSink { path: path.into() }
    }
}

impl Sink for SqliteSink {
    fn open(&mut self, board: &str) -> Result<Box<dyn Destination>> {
        let conn = db::connect(&self.path)?;
        db::init_schema(&conn)?;
        Ok(Box::new(SqliteDestination {
            conn,
            board: board.to_string(),
            posts: Vec::new(),
            comments: Vec::new(),
        }))
    }
}

/// Buffers rows and writes them in one transaction per batch.
struct SqliteDestination {
    conn: Connection,
    board: String,
    posts: Vec<Post>,
    comments: Vec<Comment>,
}

impl SqliteDestination {
    fn flush(&mut self) -> Result<()> {
        if !self.posts.is_empty() {
            db::save_posts(&self.conn, &self.posts)?;
            self.posts.clear();
        }
        if !self.comments.is_empty() {
            db::save_comments(&self.conn, &self.board, &self.comments)?;
            self.comments.clear();
        }
        Ok(())
    }
}

impl Destination for SqliteDestination {
    fn upsert_post(&mut self, _key: &PostKey, post: &Post) -> Result<()> {
        // comments travel through upsert_comment
        self.posts.push(Post {
            comments: Vec::new(),
            ..post.clone()
        });
        if self.posts.len() >= BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    fn upsert_comment(&mut self, _key: &str, comment: &Comment) -> Result<()> {
        self.comments.push(comment.clone());
        if self.comments.len() >= BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.flush()?;
        debug!("closed sqlite destination for {}", self.board);
        Ok(())
    }
}
