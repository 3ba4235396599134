//! Session and conversation state engine for the KAL chat assistant.
//!
//! Owns the set of chat sessions, mutates them in response to user turns
//! and asynchronous model replies, derives titles, persists everything,
//! and brackets the single in-flight request per session.

pub mod attachment;
pub mod config;
pub mod error;
pub mod gemini;
pub mod history;
pub mod orchestrator;
pub mod store;

pub use attachment::{encode_files, Attachment, AttachmentKind, PendingAttachments};
pub use config::AppConfig;
pub use error::{EngineError, EngineResult};
pub use gemini::{ContentPart, GeminiClient, ModelCapability};
pub use history::{AttachmentSummary, ChatMessage, ChatSession, Role};
pub use orchestrator::{Orchestrator, SendOutcome};
pub use store::{FileStorage, MemoryStorage, SessionStore, SnapshotStorage};
