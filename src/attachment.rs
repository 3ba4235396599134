//! Attachment encoding: turns raw files into transport-ready payloads
//! (base64 data + MIME type) and displayable previews.
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::path::Path;
use tracing::warn;

use crate::error::EngineError;
use crate::history::AttachmentSummary;

/// How an attachment presents before sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentKind {
    /// `image/*` files carry a `data:` URI preview.
    Image { preview: String },
    /// Anything else: still transmitted inline, never previewed.
    OpaqueFile,
}

/// One file selected for a pending send. Raw bytes are kept only until
/// the request is built; messages retain an [`AttachmentSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub kind: AttachmentKind,
    data: Vec<u8>,
}

impl Attachment {
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        let mime_type = mime_type.into();
        let kind = if mime_type.starts_with("image/") {
            let encoded = BASE64_STANDARD.encode(&data);
            AttachmentKind::Image {
                preview: format!("data:{};base64,{}", mime_type, encoded),
            }
        } else {
            AttachmentKind::OpaqueFile
        };
        Self {
            name: name.into(),
            mime_type,
            kind,
            data,
        }
    }

    /// Reads and encodes one file. The MIME type is guessed from the
    /// extension; unreadable files surface an error the caller drops.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let data = tokio::fs::read(path).await.map_err(|source| {
            EngineError::Attachment {
                name: name.clone(),
                source,
            }
        })?;
        let mime_type = guess_mime_type(path);
        Ok(Self::from_bytes(name, mime_type, data))
    }

    pub fn preview(&self) -> Option<&str> {
        match &self.kind {
            AttachmentKind::Image { preview } => Some(preview),
            AttachmentKind::OpaqueFile => None,
        }
    }

    pub fn payload_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.data)
    }

    /// The lightweight record a message keeps; the raw payload stays behind.
    pub fn summary(&self) -> AttachmentSummary {
        AttachmentSummary {
            name: self.name.clone(),
            preview: self.preview().map(str::to_string),
        }
    }
}

/// Encodes a batch of files concurrently. Files that fail to read are
/// dropped without affecting the others; no ordering is guaranteed
/// beyond "each success appears".
pub async fn encode_files<P: AsRef<Path>>(paths: &[P]) -> Vec<Attachment> {
    let reads = paths.iter().map(Attachment::from_file);
    futures::future::join_all(reads)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                warn!(error = %e, "dropping unreadable attachment");
                None
            }
        })
        .collect()
}

fn guess_mime_type(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// The attachments queued for the next send.
#[derive(Debug, Default)]
pub struct PendingAttachments {
    items: Vec<Attachment>,
}

impl PendingAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attachment: Attachment) {
        self.items.push(attachment);
    }

    /// Removes by index; the rest shift down. Out-of-range is a no-op.
    pub fn remove(&mut self, index: usize) -> Option<Attachment> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    /// Drains everything for the send that is about to start.
    pub fn take(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.items)
    }

    pub fn items(&self) -> &[Attachment] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
