//! Documents the fetch protocol reads attachments from.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use parking_lot::RwLock;

use crate::error::{BusError, Result};
use crate::handler::BoxFuture;
use crate::message::CardId;

/// A stored file with its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type, e.g. `text/css`.
    pub content_type: String,
    /// File contents.
    pub data: Bytes,
}

impl Attachment {
    /// Create a new attachment.
    pub fn new(content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Encode as `data:<content-type>;base64,<data>`.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.content_type, BASE64.encode(&self.data))
    }
}

/// The note document behind a card.
#[derive(Debug, Clone, Default)]
pub struct Note {
    /// Note document ID.
    pub id: String,
    /// Template (model) the note is rendered with.
    pub template_id: String,
    attachments: HashMap<String, Attachment>,
}

impl Note {
    /// Create a note without attachments.
    pub fn new(id: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template_id: template_id.into(),
            attachments: HashMap::new(),
        }
    }

    /// Add an attachment.
    pub fn with_attachment(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.attachments.insert(name.into(), attachment);
        self
    }

    /// Look up an attachment by file name.
    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.get(name)
    }
}

/// A template (model) document shared by many notes.
#[derive(Debug, Clone, Default)]
pub struct Template {
    /// Template document ID.
    pub id: String,
    attachments: HashMap<String, Attachment>,
}

impl Template {
    /// Create a template without attachments.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attachments: HashMap::new(),
        }
    }

    /// Add an attachment.
    pub fn with_attachment(mut self, name: impl Into<String>, attachment: Attachment) -> Self {
        self.attachments.insert(name.into(), attachment);
        self
    }

    /// Look up an attachment by file name.
    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.get(name)
    }
}

/// Read access to note and template documents.
pub trait DocumentStore: Send + Sync + 'static {
    /// The note behind a card.
    fn note(&self, card_id: &CardId) -> BoxFuture<'static, Result<Note>>;

    /// A template by ID.
    fn template(&self, template_id: &str) -> BoxFuture<'static, Result<Template>>;
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryStore {
    notes: RwLock<HashMap<CardId, Note>>,
    templates: RwLock<HashMap<String, Template>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the note for a card, replacing any previous one.
    pub fn insert_note(&self, card_id: impl Into<CardId>, note: Note) {
        self.notes.write().insert(card_id.into(), note);
    }

    /// Store a template, replacing any previous one with the same ID.
    pub fn insert_template(&self, template: Template) {
        self.templates.write().insert(template.id.clone(), template);
    }
}

impl DocumentStore for MemoryStore {
    fn note(&self, card_id: &CardId) -> BoxFuture<'static, Result<Note>> {
        let result = self
            .notes
            .read()
            .get(card_id)
            .cloned()
            .ok_or_else(|| BusError::Storage(format!("no note for card {card_id}")));
        Box::pin(async move { result })
    }

    fn template(&self, template_id: &str) -> BoxFuture<'static, Result<Template>> {
        let result = self
            .templates
            .read()
            .get(template_id)
            .cloned()
            .ok_or_else(|| BusError::Storage(format!("template {template_id} not found")));
        Box::pin(async move { result })
    }
}
