use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The three push marks a reply can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushType {
    Agree,
    Neutral,
    Disagree,
}

impl PushType {
    /// Map the rendered glyph (`推`, `→`, `噓`) to a push type.
    pub fn from_mark(mark: &str) -> Option<Self> {
        match mark.trim() {
            "推" => Some(PushType::Agree),
            "→" => Some(PushType::Neutral),
            "噓" => Some(PushType::Disagree),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PushType::Agree => "agree",
            PushType::Neutral => "neutral",
            PushType::Disagree => "disagree",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCount {
    pub agree: u32,
    pub neutral: u32,
    pub disagree: u32,
}

impl PushCount {
    pub fn tally(comments: &[Comment]) -> Self {
        let mut count = PushCount::default();
        for c in comments {
            match c.kind {
                PushType::Agree => count.agree += 1,
                PushType::Neutral => count.neutral += 1,
                PushType::Disagree => count.disagree += 1,
            }
        }
        count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PushType,
    pub author: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub published: NaiveDateTime,
    pub crawled: NaiveDateTime,
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub board: String,
    pub author: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    pub ip: Option<String>,
    pub published: NaiveDateTime,
    pub crawled: NaiveDateTime,
    pub comments: Vec<Comment>,
    pub count: PushCount,
}

/// One class node on the path from the hierarchy root down to a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    pub id: String,
    pub name: String,
    pub class: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMeta {
    pub name: String,
    pub class: String,
    pub title: String,
    pub path: Vec<ClassNode>,
}
