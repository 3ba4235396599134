//! The session store owns every chat session and writes the full
//! snapshot through its storage after each mutation.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::history::{derive_session_title, ChatMessage, ChatSession, Role, DEFAULT_SESSION_TITLE};

/// Namespace key under which the whole snapshot is persisted.
pub const SNAPSHOT_KEY: &str = "kalchat-sessions";

/// Durable key-value storage for the session snapshot. Writes are
/// best-effort: a failed save must never fail the mutation behind it.
pub trait SnapshotStorage: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, payload: &str);
}

/// File-backed storage keeping `<key>.json` in a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage rooted at the platform data directory.
    pub fn in_data_dir() -> Result<Self, EngineError> {
        let data_dir = dirs_next::data_dir().ok_or_else(|| EngineError::Persistence {
            message: "no platform data directory available".to_string(),
        })?;
        let dir = data_dir.join("KalChat").join("data");
        fs::create_dir_all(&dir).map_err(|e| EngineError::Persistence {
            message: format!("failed to create {}: {}", dir.display(), e),
        })?;
        Ok(Self::new(dir))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl SnapshotStorage for FileStorage {
    fn load(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn save(&self, key: &str, payload: &str) {
        if let Err(e) = fs::write(self.path_for(key), payload) {
            warn!(key, error = %e, "failed to write session snapshot");
        }
    }
}

/// In-memory storage, used in tests and as a null persistence medium.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn save(&self, key: &str, payload: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), payload.to_string());
    }
}

#[derive(Deserialize)]
struct Snapshot {
    sessions: Vec<ChatSession>,
    active_id: String,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    sessions: &'a [ChatSession],
    active_id: &'a str,
}

/// Owns the ordered session collection and the active session id.
///
/// Invariants: the collection is never empty, and the active id always
/// resolves to a member. Every successful mutation persists the full
/// snapshot before returning.
pub struct SessionStore {
    sessions: Vec<ChatSession>,
    active_id: String,
    storage: Box<dyn SnapshotStorage>,
}

impl SessionStore {
    /// Loads the persisted snapshot, falling back to a single default
    /// session when it is missing, malformed or violates the invariants.
    pub fn new(storage: Box<dyn SnapshotStorage>) -> Self {
        let restored = storage
            .load(SNAPSHOT_KEY)
            .and_then(|payload| match serde_json::from_str::<Snapshot>(&payload) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(error = %e, "discarding malformed session snapshot");
                    None
                }
            })
            .filter(|snapshot| {
                !snapshot.sessions.is_empty()
                    && snapshot.sessions.iter().any(|s| s.id == snapshot.active_id)
            });

        let (sessions, active_id) = match restored {
            Some(snapshot) => {
                info!(count = snapshot.sessions.len(), "restored session snapshot");
                (snapshot.sessions, snapshot.active_id)
            }
            None => {
                let session = ChatSession::new();
                let id = session.id.clone();
                (vec![session], id)
            }
        };

        Self {
            sessions,
            active_id,
            storage,
        }
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active_session(&self) -> Option<&ChatSession> {
        self.get(&self.active_id)
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Prepends a fresh session and makes it active.
    pub fn create_session(&mut self) -> String {
        let session = ChatSession::new();
        let id = session.id.clone();
        self.sessions.insert(0, session);
        self.active_id = id.clone();
        self.persist();
        id
    }

    /// Makes `id` active. Returns false (no-op) for an unknown id.
    pub fn select_session(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active_id = id.to_string();
        self.persist();
        true
    }

    /// Removes a session. The collection never empties: deleting the last
    /// session creates a fresh one. Deleting the active session moves the
    /// active id to the first survivor.
    pub fn delete_session(&mut self, id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return false;
        }
        if self.sessions.is_empty() {
            let session = ChatSession::new();
            self.active_id = session.id.clone();
            self.sessions.push(session);
        } else if self.active_id == id {
            self.active_id = self.sessions[0].id.clone();
        }
        self.persist();
        true
    }

    /// Sets an explicit title, overriding any derived one.
    pub fn rename_session(&mut self, id: &str, new_title: impl Into<String>) -> bool {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        session.title = new_title.into();
        session.updated_at = crate::history::current_timestamp();
        self.persist();
        true
    }

    /// Appends one message. The first user message of a still-untitled
    /// session also sets the title.
    pub fn append_message(&mut self, id: &str, message: ChatMessage) -> Result<(), EngineError> {
        let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) else {
            return Err(EngineError::SessionNotFound(id.to_string()));
        };
        if message.role == Role::User
            && session.title == DEFAULT_SESSION_TITLE
            && !session.has_user_message()
        {
            session.title = derive_session_title(&message.content);
        }
        session.updated_at = message.timestamp;
        session.messages.push(message);
        self.persist();
        Ok(())
    }

    /// Writes the whole snapshot. Failures are logged and swallowed.
    fn persist(&self) {
        let snapshot = SnapshotRef {
            sessions: &self.sessions,
            active_id: &self.active_id,
        };
        match serde_json::to_string(&snapshot) {
            Ok(payload) => self.storage.save(SNAPSHOT_KEY, &payload),
            Err(e) => warn!(error = %e, "failed to serialize session snapshot"),
        }
    }

    /// Final flush at teardown.
    pub fn flush(&self) {
        self.persist();
    }
}
