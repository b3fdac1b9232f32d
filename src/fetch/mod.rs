//! File fetch protocol - serves scripts, styles and attachments to frames.
//!
//! A frame sends `{"type": "fetch", "payload": {"path": "..."}}`. The file
//! is resolved against, in order:
//!
//! 1. the attachments of the card's note,
//! 2. the attachments of the note's template,
//! 3. the built-in placeholders for `script.js` and `style.css`.
//!
//! The reply is a single `fetch` message whose payload is the file as a
//! `data:` URI. Any failure is returned from the handler and nothing is
//! sent to the frame.

mod store;

pub use store::{Attachment, DocumentStore, MemoryStore, Note, Template};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BusError, Result};
use crate::handler::{BoxFuture, Handler, HandlerResult, Responder};
use crate::message::{CardId, Payload};

/// Message type the fetch handler is registered under.
pub const FETCH_MESSAGE_TYPE: &str = "fetch";

/// Placeholder served for `script.js`.
pub const PLACEHOLDER_SCRIPT: &str = "/* no card script */\n";

/// Placeholder served for `style.css`.
pub const PLACEHOLDER_STYLE: &str = "/* no card style */\n";

/// A fetch request payload.
///
/// Accepts `{"path": "..."}` or a bare path string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFetchRequest")]
pub struct FetchRequest {
    /// File name to fetch.
    pub path: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFetchRequest {
    Bare(String),
    Object { path: String },
}

impl From<RawFetchRequest> for FetchRequest {
    fn from(raw: RawFetchRequest) -> Self {
        match raw {
            RawFetchRequest::Bare(path) | RawFetchRequest::Object { path } => Self { path },
        }
    }
}

/// Built-in file for a well-known path, if there is one.
pub fn placeholder(path: &str) -> Option<Attachment> {
    match path {
        "script.js" => Some(Attachment::new("text/javascript", PLACEHOLDER_SCRIPT)),
        "style.css" => Some(Attachment::new("text/css", PLACEHOLDER_STYLE)),
        _ => None,
    }
}

/// Resolve a file for a card: note first, then template, then placeholder.
pub async fn fetch_file<S>(store: &S, card_id: &CardId, path: &str) -> Result<Attachment>
where
    S: DocumentStore + ?Sized,
{
    let note = store.note(card_id).await?;
    if let Some(att) = note.attachment(path) {
        tracing::debug!("Serving '{}' from note {}", path, note.id);
        return Ok(att.clone());
    }

    let template = store.template(&note.template_id).await?;
    if let Some(att) = template.attachment(path) {
        tracing::debug!("Serving '{}' from template {}", path, template.id);
        return Ok(att.clone());
    }

    placeholder(path).ok_or_else(|| BusError::NotFound(path.to_string()))
}

/// Handler for `fetch` messages.
pub struct FetchHandler {
    store: Arc<dyn DocumentStore>,
}

impl FetchHandler {
    /// Create a handler reading from the given store.
    pub fn new<S: DocumentStore>(store: Arc<S>) -> Self {
        Self {
            store: store as Arc<dyn DocumentStore>,
        }
    }
}

/// Fetch handler over `store`, to register under [`FETCH_MESSAGE_TYPE`].
pub fn fetch_handler<S: DocumentStore>(store: Arc<S>) -> FetchHandler {
    FetchHandler::new(store)
}

impl Handler for FetchHandler {
    fn call(
        &self,
        card_id: CardId,
        payload: Payload,
        responder: Responder,
    ) -> BoxFuture<'static, HandlerResult> {
        let store = self.store.clone();
        Box::pin(async move {
            let request: FetchRequest = serde_json::from_value(payload)?;
            tracing::debug!("fetch request: file '{}' for card '{}'", request.path, card_id);

            let file = fetch_file(store.as_ref(), &card_id, &request.path).await?;
            responder
                .respond(FETCH_MESSAGE_TYPE, &file.to_data_uri())
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_note(
            "c1",
            Note::new("n1", "t1")
                .with_attachment("x", Attachment::new("text/plain", &b"from note"[..])),
        );
        store.insert_template(
            Template::new("t1")
                .with_attachment("x", Attachment::new("text/plain", &b"from template"[..]))
                .with_attachment("script.js", Attachment::new("text/javascript", &b"go()"[..])),
        );
        store
    }

    #[tokio::test]
    async fn test_note_wins_over_template() {
        let file = fetch_file(&store(), &"c1".into(), "x").await.unwrap();
        assert_eq!(&file.data[..], b"from note");
    }

    #[tokio::test]
    async fn test_template_wins_over_placeholder() {
        let file = fetch_file(&store(), &"c1".into(), "script.js").await.unwrap();
        assert_eq!(&file.data[..], b"go()");
    }

    #[tokio::test]
    async fn test_placeholder_script() {
        let store = MemoryStore::new();
        store.insert_note("c1", Note::new("n1", "t1"));
        store.insert_template(Template::new("t1"));

        let file = fetch_file(&store, &"c1".into(), "script.js").await.unwrap();
        assert_eq!(file.content_type, "text/javascript");
        assert_eq!(&file.data[..], PLACEHOLDER_SCRIPT.as_bytes());
    }

    #[tokio::test]
    async fn test_unknown_path_not_found() {
        let err = fetch_file(&store(), &"c1".into(), "missing.png")
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::NotFound(ref p) if p == "missing.png"));
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let store = MemoryStore::new();
        store.insert_note("c1", Note::new("n1", "absent"));

        // Note lookup fails
        let err = fetch_file(&store, &"c2".into(), "style.css").await.unwrap_err();
        assert!(matches!(err, BusError::Storage(_)));

        // Template lookup fails, even for a placeholder path
        let err = fetch_file(&store, &"c1".into(), "style.css").await.unwrap_err();
        assert!(matches!(err, BusError::Storage(_)));
    }

    #[test]
    fn test_request_forms() {
        let object: FetchRequest = serde_json::from_value(json!({"path": "a.css"})).unwrap();
        let bare: FetchRequest = serde_json::from_value(json!("a.css")).unwrap();
        assert_eq!(object, bare);

        assert!(serde_json::from_value::<FetchRequest>(json!(42)).is_err());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholder("style.css").unwrap().content_type, "text/css");
        assert!(placeholder("other.css").is_none());
    }
}
