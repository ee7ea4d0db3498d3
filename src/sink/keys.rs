use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

use crate::model::Post;

/// Layout existing stores were keyed with; changing it re-keys every comment.
const KEY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const COMMENT_KEY_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostKey {
    pub board: String,
    pub id: String,
}

pub fn post_key(post: &Post) -> PostKey {
    PostKey {
        board: post.board.clone(),
        id: post.id.clone(),
    }
}

/// First 16 hex chars of sha256(post_id ‖ author ‖ published).
///
/// Two pushes by one author in the same minute on one post share a key, and
/// the later one overwrites the earlier.
pub fn comment_key(post_id: &str, author: &str, published: NaiveDateTime) -> String {
    let mut hasher = Sha256::new();
    hasher.update(post_id.as_bytes());
    hasher.update(author.as_bytes());
    hasher.update(published.format(KEY_TIME_FORMAT).to_string().as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(COMMENT_KEY_LEN);
    key
}
