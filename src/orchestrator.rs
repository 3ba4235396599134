//! Drives the request/response cycle for one user turn: optimistic user
//! append, model call, assistant (or fallback) append. Each session moves
//! between Idle and AwaitingResponse; at most one request is in flight
//! per session at a time.
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::attachment::Attachment;
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::gemini::{ContentPart, ModelCapability};
use crate::history::ChatMessage;
use crate::store::SessionStore;

/// Stands in for the text when a send carries attachments only.
pub const ATTACHMENT_ONLY_PROMPT: &str = "Please review the attached files.";

/// Appended in place of a reply when the model call fails, whatever the
/// failure kind.
pub const FALLBACK_MESSAGE: &str =
    "Sorry, something went wrong. Please check that your API key is configured correctly and try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant turn that was appended (a real reply or the fallback).
    Replied(String),
    /// The session already had a request in flight; nothing changed.
    Busy,
    /// Empty text and no attachments; nothing changed.
    NothingToSend,
}

/// Marks one session as awaiting a response for as long as it lives.
/// Dropping it releases the flag on every exit path.
struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    session_id: String,
}

impl InFlightGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, session_id: &str) -> Option<Self> {
        if !in_flight.lock().unwrap().insert(session_id.to_string()) {
            return None;
        }
        Some(Self {
            in_flight: in_flight.clone(),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap().remove(&self.session_id);
    }
}

/// The originating session id and request parts, captured at send time.
/// The reply resolves against this, never against whichever session is
/// active when the response arrives.
struct RequestContext {
    session_id: String,
    parts: Vec<ContentPart>,
}

pub struct Orchestrator {
    store: Arc<Mutex<SessionStore>>,
    model: Arc<dyn ModelCapability>,
    config: AppConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<Mutex<SessionStore>>,
        model: Arc<dyn ModelCapability>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            model,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn store(&self) -> &Arc<Mutex<SessionStore>> {
        &self.store
    }

    pub fn is_awaiting(&self, session_id: &str) -> bool {
        self.in_flight.lock().unwrap().contains(session_id)
    }

    /// Sends one user turn into a session.
    ///
    /// No-ops when there is nothing to send or the session is already
    /// awaiting a response. A missing API key short-circuits before any
    /// message is appended. Model failures never propagate: the fallback
    /// assistant message is appended instead and the session returns to
    /// Idle.
    pub async fn send(
        &self,
        session_id: &str,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<SendOutcome, EngineError> {
        if text.trim().is_empty() && attachments.is_empty() {
            return Ok(SendOutcome::NothingToSend);
        }
        if !self.config.has_api_key() {
            return Err(EngineError::MissingApiKey);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, session_id) else {
            return Ok(SendOutcome::Busy);
        };

        let context = {
            let mut store = self.store.lock().unwrap();
            let summaries = attachments.iter().map(Attachment::summary).collect();
            store.append_message(session_id, ChatMessage::user(text, summaries))?;
            RequestContext {
                session_id: session_id.to_string(),
                parts: build_parts(text, &attachments),
            }
        };
        drop(attachments); // raw payloads end with request construction

        let reply = match self.model.generate(&self.config.model, &context.parts).await {
            Ok(text) => {
                info!(session = %context.session_id, "model reply received");
                text
            }
            Err(e) => {
                warn!(session = %context.session_id, error = %e, "model call failed, substituting fallback");
                FALLBACK_MESSAGE.to_string()
            }
        };

        let mut store = self.store.lock().unwrap();
        if store
            .append_message(&context.session_id, ChatMessage::assistant(reply.clone()))
            .is_err()
        {
            warn!(session = %context.session_id, "originating session was deleted mid-flight, reply discarded");
        }
        Ok(SendOutcome::Replied(reply))
    }
}

/// The text part (or the attachment-only placeholder) followed by one
/// inline part per attachment, each carrying its exact MIME type.
fn build_parts(text: &str, attachments: &[Attachment]) -> Vec<ContentPart> {
    let trimmed = text.trim();
    let prompt = if trimmed.is_empty() {
        ATTACHMENT_ONLY_PROMPT.to_string()
    } else {
        trimmed.to_string()
    };

    let mut parts = vec![ContentPart::Text(prompt)];
    for attachment in attachments {
        parts.push(ContentPart::Inline {
            data: attachment.payload_base64(),
            mime_type: attachment.mime_type.clone(),
        });
    }
    parts
}
