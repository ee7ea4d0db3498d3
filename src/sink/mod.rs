pub mod jsonl;
pub mod keys;
pub mod router;
pub mod sqlite;

use anyhow::Result;

use crate::model::{Comment, Post};
pub use keys::PostKey;
pub use router::OutputRouter;

/// One board's output. Upserts are keyed: writing a key twice leaves one
/// record holding the later value.
pub trait Destination: Send {
    fn upsert_post(&mut self, key: &PostKey, post: &Post) -> Result<()>;
    fn upsert_comment(&mut self, key: &str, comment: &Comment) -> Result<()>;
    /// Flush anything buffered. Nothing may be written after this.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A storage backend that hands out one destination per board.
pub trait Sink {
    fn open(&mut self, board: &str) -> Result<Box<dyn Destination>>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn open(&mut self, board: &str) -> Result<Box<dyn Destination>> {
        (**self).open(board)
    }
}
