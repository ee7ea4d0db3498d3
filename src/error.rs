use thiserror::Error;

/// Why a single post or push did not become a record.
///
/// These never abort a crawl: the extractor returns them as values and the
/// caller logs them next to the offending URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no author found")]
    MissingAuthor,

    #[error("missing or unparseable publish time: {0:?}")]
    MissingPublishTime(Option<String>),

    #[error("unknown comment published time: {raw:?} (author: {author})")]
    UnparseableCommentTime { author: String, raw: String },

    #[error("unknown push tag: {0:?}")]
    UnknownPushTag(String),

    /// Empty ip/time cell, left behind when the author quotes an earlier push.
    #[error("rendering duplicate of an earlier push")]
    RenderDuplicatePush,

    #[error("404")]
    NotFound,

    #[error("extraction failed: {0}")]
    Malformed(String),
}
