//! SessionStore (C11) — contract only, per SPEC_FULL.md §4.11.
//!
//! Field shapes grounded on `original_source/l88_backend/models/{session,document}.py`.
//! The store itself is new: session CRUD/auth/RBAC are out of scope, so this
//! is the minimal in-memory implementation needed to exercise the Ingestor
//! and Pipeline.

use crate::types::{DocumentMeta, SessionRecord, SessionType};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    documents: RwLock<HashMap<String, Vec<DocumentMeta>>>,
    /// Library documents are shared, not session-owned (distilled spec §3
    /// "Ownership"), so they live outside the per-session map.
    library: RwLock<Vec<DocumentMeta>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(&self, id: impl Into<String>, web_mode: bool) {
        let id = id.into();
        self.sessions.write().insert(
            id.clone(),
            SessionRecord {
                id,
                session_type: SessionType::General,
                web_mode,
            },
        );
    }

    pub fn get_session(&self, id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(id).cloned()
    }

    /// Documents belonging to a session (session-sourced only, mirrors the
    /// reference's `list_session_documents` filtering on `source == session`).
    pub fn list_documents(&self, session_id: &str) -> Vec<DocumentMeta> {
        self.documents
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn selected_doc_ids(&self, session_id: &str) -> Vec<String> {
        self.list_documents(session_id)
            .into_iter()
            .filter(|d| d.selected)
            .map(|d| d.id)
            .collect()
    }

    pub fn insert_document(&self, session_id: &str, doc: DocumentMeta) {
        self.documents
            .write()
            .entry(session_id.to_string())
            .or_default()
            .push(doc);
        self.update_session_type(session_id);
    }

    pub fn remove_document(&self, session_id: &str, doc_id: &str) {
        if let Some(docs) = self.documents.write().get_mut(session_id) {
            docs.retain(|d| d.id != doc_id);
        }
        self.update_session_type(session_id);
    }

    pub fn toggle_selection(&self, session_id: &str, doc_id: &str, selected: bool) {
        if let Some(docs) = self.documents.write().get_mut(session_id) {
            if let Some(d) = docs.iter_mut().find(|d| d.id == doc_id) {
                d.selected = selected;
            }
        }
    }

    pub fn list_library_documents(&self) -> Vec<DocumentMeta> {
        self.library.read().clone()
    }

    pub fn insert_library_document(&self, doc: DocumentMeta) {
        self.library.write().push(doc);
    }

    pub fn remove_library_document(&self, doc_id: &str) {
        self.library.write().retain(|d| d.id != doc_id);
    }

    /// `general -> rag` on first ingested session document, `rag -> general`
    /// once the last one is removed.
    fn update_session_type(&self, session_id: &str) {
        let has_docs = !self
            .documents
            .read()
            .get(session_id)
            .map(|d| d.is_empty())
            .unwrap_or(true);
        if let Some(session) = self.sessions.write().get_mut(session_id) {
            session.session_type = if has_docs {
                SessionType::Rag
            } else {
                SessionType::General
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn doc(id: &str) -> DocumentMeta {
        DocumentMeta {
            id: id.to_string(),
            session_id: Some("s1".into()),
            filename: "a.pdf".into(),
            source: Source::Session,
            page_count: 1,
            chunk_count: 1,
            selected: true,
            uploaded_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn session_type_transitions_on_mutation() {
        let store = SessionStore::new();
        store.create_session("s1", false);
        assert_eq!(
            store.get_session("s1").unwrap().session_type,
            SessionType::General
        );

        store.insert_document("s1", doc("d1"));
        assert_eq!(
            store.get_session("s1").unwrap().session_type,
            SessionType::Rag
        );

        store.remove_document("s1", "d1");
        assert_eq!(
            store.get_session("s1").unwrap().session_type,
            SessionType::General
        );
    }
}
