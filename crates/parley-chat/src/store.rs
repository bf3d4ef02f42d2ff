//! Conversation history with a single guard over every read and write.
//!
//! The in-memory history only ever grows. Bounds apply to what leaves the
//! store: prompt windows and the persisted file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use parley_core::types::{Message, Role};

use crate::error::ChatError;

/// On-disk shape written by [`ConversationStore::persist`].
#[derive(Serialize)]
struct PersistedHistory<'a> {
    history: &'a [Message],
}

/// Shapes accepted by [`ConversationStore::load`].
#[derive(Deserialize)]
#[serde(untagged)]
enum HistoryFile {
    Wrapped { history: Vec<Message> },
    Bare(Vec<Message>),
}

impl HistoryFile {
    fn into_messages(self) -> Vec<Message> {
        match self {
            HistoryFile::Wrapped { history } | HistoryFile::Bare(history) => history,
        }
    }
}

/// Ordered conversation history shared between turns.
#[derive(Debug, Default)]
pub struct ConversationStore {
    history: Mutex<Vec<Message>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            history: Mutex::new(messages),
        }
    }

    /// Load persisted history, starting empty if the file is missing or
    /// cannot be parsed.
    pub fn load(path: &Path) -> Self {
        match read_history(path) {
            Ok(messages) => {
                info!(path = %path.display(), messages = messages.len(), "Conversation history loaded");
                Self::from_messages(messages)
            }
            Err(e) if !path.exists() => {
                debug!(path = %path.display(), error = %e, "No conversation history yet");
                Self::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load conversation history, starting empty");
                Self::new()
            }
        }
    }

    // A panic while holding the guard cannot leave the Vec half-written,
    // so a poisoned lock is still safe to use.
    fn guard(&self) -> MutexGuard<'_, Vec<Message>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, role: Role, text: impl Into<String>) {
        self.guard().push(Message::new(role, text));
    }

    /// Append `message` and return the last `n` messages, including it,
    /// as one consistent snapshot.
    pub fn append_and_window(&self, message: Message, n: usize) -> Vec<Message> {
        let mut history = self.guard();
        history.push(message);
        tail(&history, n).to_vec()
    }

    /// The last `n` messages in order.
    pub fn window(&self, n: usize) -> Vec<Message> {
        tail(&self.guard(), n).to_vec()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.guard().clone()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Write the last `max_kept` messages to `path` as
    /// `{"history": [...]}`.
    ///
    /// The file is written beside the target and renamed over it. The guard
    /// stays held for the whole write so concurrent persists never
    /// interleave. Returns the number of messages written.
    pub fn persist(&self, path: &Path, max_kept: usize) -> Result<usize, ChatError> {
        let history = self.guard();
        let kept = tail(&history, max_kept);
        let contents = serde_json::to_string_pretty(&PersistedHistory { history: kept })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = tmp_path_for(path);
        let written = write_synced(&tmp_path, contents.as_bytes())
            .and_then(|()| fs::rename(&tmp_path, path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(ChatError::Persistence(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )));
        }

        debug!(path = %path.display(), messages = kept.len(), "Conversation history persisted");
        Ok(kept.len())
    }
}

fn tail(history: &[Message], n: usize) -> &[Message] {
    &history[history.len().saturating_sub(n)..]
}

/// Write `bytes` and flush them to disk before returning.
fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn read_history(path: &Path) -> Result<Vec<Message>, ChatError> {
    let contents = fs::read_to_string(path)?;
    let file: HistoryFile = serde_json::from_str(&contents)?;
    Ok(file.into_messages())
}
