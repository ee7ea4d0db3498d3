use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use crate::model::{BoardMeta, Comment, Post};

/// Wire form for stored datetimes, matching the JSON records.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            board      TEXT NOT NULL,
            id         TEXT NOT NULL,
            author     TEXT NOT NULL,
            title      TEXT NOT NULL,
            content    TEXT NOT NULL,
            quote      TEXT,
            ip         TEXT,
            published  TEXT NOT NULL,
            crawled    TEXT NOT NULL,
            agree      INTEGER NOT NULL DEFAULT 0,
            neutral    INTEGER NOT NULL DEFAULT 0,
            disagree   INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (board, id)
        );
        CREATE INDEX IF NOT EXISTS idx_posts_published ON posts(board, published);

        CREATE TABLE IF NOT EXISTS comments (
            id         TEXT PRIMARY KEY,
            board      TEXT NOT NULL,
            post_id    TEXT NOT NULL,
            type       TEXT NOT NULL CHECK(type IN ('agree','neutral','disagree')),
            author     TEXT NOT NULL,
            content    TEXT NOT NULL,
            ip         TEXT,
            published  TEXT NOT NULL,
            crawled    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(board, post_id);

        -- Board hierarchy, path is a JSON array of class nodes
        CREATE TABLE IF NOT EXISTS boards (
            name          TEXT PRIMARY KEY,
            class         TEXT NOT NULL,
            title         TEXT NOT NULL,
            path          TEXT NOT NULL,
            discovered_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Records ──

pub fn save_posts(conn: &Connection, posts: &[Post]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO posts
             (board, id, author, title, content, quote, ip, published, crawled, agree, neutral, disagree)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        for p in posts {
            count += stmt.execute(rusqlite::params![
                p.board,
                p.id,
                p.author,
                p.title,
                p.content,
                p.quote,
                p.ip,
                p.published.format(TIME_FORMAT).to_string(),
                p.crawled.format(TIME_FORMAT).to_string(),
                p.count.agree,
                p.count.neutral,
                p.count.disagree,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn save_comments(conn: &Connection, board: &str, comments: &[Comment]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO comments
             (id, board, post_id, type, author, content, ip, published, crawled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for c in comments {
            count += stmt.execute(rusqlite::params![
                c.id,
                board,
                c.post_id,
                c.kind.as_str(),
                c.author,
                c.content,
                c.ip,
                c.published.format(TIME_FORMAT).to_string(),
                c.crawled.format(TIME_FORMAT).to_string(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Boards ──

pub fn save_boards(conn: &Connection, boards: &[BoardMeta]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO boards (name, class, title, path)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for b in boards {
            let path = serde_json::to_string(&b.path)?;
            count += stmt.execute(rusqlite::params![b.name, b.class, b.title, path])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_board_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM boards ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub boards: usize,
    pub posts: usize,
    pub comments: usize,
    pub crawled_boards: usize,
    pub last_crawled: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let boards: usize = conn.query_row("SELECT COUNT(*) FROM boards", [], |r| r.get(0))?;
    let posts: usize = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
    let comments: usize = conn.query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))?;
    let crawled_boards: usize =
        conn.query_row("SELECT COUNT(DISTINCT board) FROM posts", [], |r| r.get(0))?;
    let last_crawled: Option<String> =
        conn.query_row("SELECT MAX(crawled) FROM posts", [], |r| r.get(0))?;
    Ok(Stats {
        boards,
        posts,
        comments,
        crawled_boards,
        last_crawled,
    })
}

/// Busiest boards by stored post count.
pub fn fetch_board_counts(conn: &Connection, limit: usize) -> Result<Vec<(String, usize)>> {
    let sql = format!(
        "SELECT board, COUNT(*) AS n FROM posts GROUP BY board ORDER BY n DESC, board LIMIT {}",
        limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
