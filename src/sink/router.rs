use std::collections::hash_map::Entry;
use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, warn};

use super::keys::post_key;
use super::{Destination, Sink};
use crate::model::Post;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteStats {
    pub boards: usize,
    pub posts: usize,
    pub comments: usize,
}

/// Run-scoped registry of open per-board destinations.
///
/// A board's destination is opened on its first post and stays open until
/// [`OutputRouter::finish`]. The router is the only thing that writes to it.
pub struct OutputRouter<S: Sink> {
    sink: S,
    open: HashMap<String, Box<dyn Destination>>,
    stats: RouteStats,
}

impl<S: Sink> OutputRouter<S> {
    pub fn new(sink: S) -> Self {
        OutputRouter {
            sink,
            open: HashMap::new(),
            stats: RouteStats::default(),
        }
    }

    /// Upsert the post, then each of its comments under its derived id.
    pub fn route(&mut self, post: &Post) -> Result<()> {
        let key = post_key(post);
        let dest = match self.open.entry(key.board.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                debug!("opening destination for board {}", key.board);
                self.stats.boards += 1;
                e.insert(self.sink.open(&key.board)?)
            }
        };

        dest.upsert_post(&key, post)?;
        for comment in &post.comments {
            dest.upsert_comment(&comment.id, comment)?;
        }

        self.stats.posts += 1;
        self.stats.comments += post.comments.len();
        Ok(())
    }

    /// Close every destination. All are closed even if one fails; the first
    /// failure is returned.
    pub fn finish(mut self) -> Result<RouteStats> {
        let mut first_err = None;
        for (board, dest) in self.open.drain() {
            if let Err(e) = dest.close() {
                warn!("closing destination for {} failed: {}", board, e);
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(self.stats),
        }
    }
}

impl<S: Sink> Drop for OutputRouter<S> {
    fn drop(&mut self) {
        for (board, dest) in self.open.drain() {
            warn!("destination for {} dropped without finish, closing", board);
            if let Err(e) = dest.close() {
                warn!("closing destination for {} failed: {}", board, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, PushCount, PushType};
    use crate::sink::keys::{comment_key, PostKey};
    use crate::sink::memory::MemorySink;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn post(board: &str, id: &str, title: &str) -> Post {
        let comments: Vec<Comment> = ["carol", "dave"]
            .iter()
            .enumerate()
            .map(|(i, author)| Comment {
                id: comment_key(id, author, at(2, i as u32)),
                kind: PushType::Agree,
                author: author.to_string(),
                content: "+1".into(),
                ip: None,
                published: at(2, i as u32),
                crawled: at(3, 0),
                post_id: id.into(),
            })
            .collect();
        Post {
            id: id.into(),
            board: board.into(),
            author: "alice".into(),
            title: title.into(),
            content: "body".into(),
            quote: None,
            ip: None,
            published: at(1, 0),
            crawled: at(3, 0),
            count: PushCount::tally(&comments),
            comments,
        }
    }

    #[test]
    fn routing_twice_is_idempotent() {
        let sink = MemorySink::default();
        let store = sink.store.clone();
        let mut router = OutputRouter::new(sink);

        router.route(&post("Gossiping", "M.1.A.1", "first")).unwrap();
        router.route(&post("Gossiping", "M.1.A.1", "edited")).unwrap();
        let stats = router.finish().unwrap();
        assert_eq!(stats, RouteStats { boards: 1, posts: 2, comments: 4 });

        let store = store.lock().unwrap();
        assert_eq!(store.posts.len(), 1);
        assert_eq!(store.comments.len(), 2);
        let key = PostKey { board: "Gossiping".into(), id: "M.1.A.1".into() };
        assert_eq!(store.posts[&key].title, "edited");
    }

    #[test]
    fn destinations_open_lazily_once_per_board() {
        let sink = MemorySink::default();
        let store = sink.store.clone();
        let mut router = OutputRouter::new(sink);
        assert!(store.lock().unwrap().opened.is_empty());

        router.route(&post("A", "M.1.A.1", "x")).unwrap();
        router.route(&post("B", "M.2.A.2", "x")).unwrap();
        router.route(&post("A", "M.3.A.3", "x")).unwrap();
        assert_eq!(store.lock().unwrap().opened, vec!["A", "B"]);
        assert!(store.lock().unwrap().closed.is_empty());

        router.finish().unwrap();
        let mut closed = store.lock().unwrap().closed.clone();
        closed.sort();
        assert_eq!(closed, vec!["A", "B"]);
    }

    #[test]
    fn same_id_on_two_boards_stays_apart() {
        let sink = MemorySink::default();
        let store = sink.store.clone();
        let mut router = OutputRouter::new(sink);
        router.route(&post("A", "M.1.A.1", "a")).unwrap();
        router.route(&post("B", "M.1.A.1", "b")).unwrap();
        drop(router);

        let store = store.lock().unwrap();
        assert_eq!(store.posts.len(), 2);
        assert_eq!(store.closed.len(), 2);
    }
}
