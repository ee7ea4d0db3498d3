use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use super::keys::PostKey;
use super::{Destination, Sink};
use crate::model::{Comment, Post};

/// One `<board>.jsonl` per board, one post per line with its comments
/// embedded. Lines already on disk are loaded on open so a re-run replaces
/// them by post id.
pub struct JsonlSink {
    dir: PathBuf,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonlSink { dir: dir.into() }
    }
}

impl Sink for JsonlSink {
    fn open(&mut self, board: &str) -> Result<Box<dyn Destination>> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(format!("{}.jsonl", board));
        let mut dest = JsonlDestination {
            path,
            lines: Vec::new(),
            index: HashMap::new(),
        };
        dest.load()?;
        Ok(Box::new(dest))
    }
}

struct JsonlDestination {
    path: PathBuf,
    /// Serialized posts in first-seen order.
    lines: Vec<String>,
    index: HashMap<String, usize>,
}

impl JsonlDestination {
    fn load(&mut self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let file = fs::File::open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match id_of(&line) {
                Some(id) => self.put(id, line),
                None => warn!("{}:{}: line without an id, dropping", self.path.display(), n + 1),
            }
        }
        debug!("loaded {} existing posts from {}", self.lines.len(), self.path.display());
        Ok(())
    }

    fn put(&mut self, id: String, line: String) {
        match self.index.get(&id) {
            Some(&i) => self.lines[i] = line,
            None => {
                self.index.insert(id, self.lines.len());
                self.lines.push(line);
            }
        }
    }
}

fn id_of(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl Destination for JsonlDestination {
    fn upsert_post(&mut self, key: &PostKey, post: &Post) -> Result<()> {
        let line = serde_json::to_string(post)?;
        self.put(key.id.clone(), line);
        Ok(())
    }

    /// Comments ride inside their post's line.
    fn upsert_comment(&mut self, _key: &str, _comment: &Comment) -> Result<()> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let tmp = tmp_path(&self.path);
        {
            let mut out = BufWriter::new(fs::File::create(&tmp)?);
            for line in &self.lines {
                writeln!(out, "{}", line)?;
            }
            out.flush()?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        debug!("wrote {} posts to {}", self.lines.len(), self.path.display());
        Ok(())
    }
}
