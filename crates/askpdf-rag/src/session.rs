//! Per-user conversation state: processed documents and chat history

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::pipeline::IngestState;
use crate::types::Document;

/// Who sent a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the chat history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A document that finished ingestion in this session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub document: Document,
    /// Chunk texts joined by blank lines
    pub content: String,
}

impl ProcessedDocument {
    pub fn new(document: Document) -> Self {
        let content = document.content();
        Self { document, content }
    }
}

/// Session state
///
/// Owned by one caller; not shared across requests.
#[derive(Debug, Default)]
pub struct Session {
    processed: HashMap<String, ProcessedDocument>,
    states: HashMap<String, IngestState>,
    current: Option<String>,
    history: Vec<ChatMessage>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processed document by identifier
    pub fn document(&self, document_id: &str) -> Option<&ProcessedDocument> {
        self.processed.get(document_id)
    }

    /// The most recently ingested or selected document
    pub fn current_document(&self) -> Option<&ProcessedDocument> {
        self.current.as_deref().and_then(|id| self.processed.get(id))
    }

    /// Make an already processed document current; false if unknown
    pub fn select(&mut self, document_id: &str) -> bool {
        if self.processed.contains_key(document_id) {
            self.current = Some(document_id.to_string());
            true
        } else {
            false
        }
    }

    /// Last ingestion state recorded for a document
    pub fn ingest_state(&self, document_id: &str) -> Option<IngestState> {
        self.states.get(document_id).copied()
    }

    pub(crate) fn set_state(&mut self, document_id: &str, state: IngestState) {
        tracing::debug!("'{}' -> {:?}", document_id, state);
        self.states.insert(document_id.to_string(), state);
    }

    pub(crate) fn record_document(&mut self, processed: ProcessedDocument) {
        let id = processed.document.document_id.clone();
        self.current = Some(id.clone());
        self.processed.insert(id, processed);
    }

    /// Append a question and its answer to the history
    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.history.push(ChatMessage::user(question));
        self.history.push(ChatMessage::assistant(answer));
    }

    /// Chat history, oldest first
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn processed(id: &str) -> ProcessedDocument {
        ProcessedDocument::new(Document::new(
            id,
            "A. B.".to_string(),
            vec![
                Chunk::new(id, 0, "A.".to_string()),
                Chunk::new(id, 1, "B.".to_string()),
            ],
        ))
    }

    #[test]
    fn test_record_document_becomes_current() {
        let mut session = Session::new();
        assert!(session.current_document().is_none());

        session.record_document(processed("a.pdf"));
        session.record_document(processed("b.pdf"));

        assert_eq!(session.current_document().unwrap().document.document_id, "b.pdf");
        assert_eq!(session.document("a.pdf").unwrap().content, "A.\n\nB.");
        assert!(session.select("a.pdf"));
        assert!(!session.select("missing.pdf"));
        assert_eq!(session.current_document().unwrap().document.document_id, "a.pdf");
    }

    #[test]
    fn test_history_order() {
        let mut session = Session::new();
        session.record_exchange("Q1", "A1");
        session.record_exchange("Q2", "A2");

        let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(session.history()[2].content, "Q2");

        session.clear_history();
        assert!(session.history().is_empty());
    }
}
