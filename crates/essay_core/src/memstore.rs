//! crates/essay_core/src/memstore.rs
//!
//! An in-memory implementation of the store ports. Backs the core's own
//! tests (including scripted failure injection for the rollback paths)
//! and doubles as an ephemeral adapter for hosts that do not need a
//! database. Also the reference implementation of write-time version
//! numbering and cascade delete.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    Annotation, AnnotationKind, AnnotationStatus, Document, DocumentBundle, TextRange, Version,
};
use crate::ports::{DocumentStore, FeedbackStore, PortError, PortResult};
use crate::workflow::EssayStatus;

#[derive(Default)]
struct Inner {
    documents: HashMap<Uuid, Document>,
    versions: HashMap<Uuid, Vec<Version>>,
    annotations: HashMap<Uuid, Vec<Annotation>>,
    /// Operation names whose next invocation fails with `Unexpected`.
    fail_next: HashSet<&'static str>,
    /// Append-only log of operation names, for call-count assertions.
    op_log: Vec<&'static str>,
}

/// Mutex-guarded in-memory store implementing both store ports.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next invocation of `op` (port method name) fail with a
    /// transient error. Used to exercise rollback and notice paths.
    pub fn fail_next(&self, op: &'static str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_next.insert(op);
        }
    }

    /// How many times `op` was invoked (failed attempts included).
    pub fn calls(&self, op: &str) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.op_log.iter().filter(|o| **o == op).count())
            .unwrap_or(0)
    }

    /// The full operation log, in invocation order.
    pub fn ops(&self) -> Vec<&'static str> {
        self.inner
            .lock()
            .map(|inner| inner.op_log.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| PortError::Unexpected(format!("Store lock poisoned: {e}")))
    }
}

impl Inner {
    fn enter(&mut self, op: &'static str) -> PortResult<()> {
        self.op_log.push(op);
        if self.fail_next.remove(op) {
            return Err(PortError::Unexpected(format!("Injected failure in {op}")));
        }
        Ok(())
    }

    fn document_mut(&mut self, document_id: Uuid) -> PortResult<&mut Document> {
        self.documents
            .get_mut(&document_id)
            .ok_or_else(|| PortError::NotFound(format!("Document {document_id} not found")))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_document(&self, document_id: Uuid) -> PortResult<DocumentBundle> {
        let mut inner = self.lock()?;
        inner.enter("fetch_document")?;
        let document = inner
            .documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {document_id} not found")))?;
        let mut bundle = DocumentBundle {
            document,
            versions: inner.versions.get(&document_id).cloned().unwrap_or_default(),
            annotations: inner
                .annotations
                .get(&document_id)
                .cloned()
                .unwrap_or_default(),
        };
        bundle.normalize();
        Ok(bundle)
    }

    async fn create_document(
        &self,
        student_id: Uuid,
        title: &str,
        prompt: &str,
    ) -> PortResult<Document> {
        let mut inner = self.lock()?;
        inner.enter("create_document")?;
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            student_id,
            coach_id: None,
            title: title.to_string(),
            prompt: prompt.to_string(),
            body: String::new(),
            word_count: 0,
            status: EssayStatus::Brainstorming,
            school_id: None,
            created_at: now,
            updated_at: now,
        };
        inner.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn save_body(
        &self,
        document_id: Uuid,
        body: &str,
        word_count: usize,
    ) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.enter("save_body")?;
        let document = inner.document_mut(document_id)?;
        document.body = body.to_string();
        document.word_count = word_count;
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn create_version(
        &self,
        document_id: Uuid,
        body: &str,
        word_count: usize,
    ) -> PortResult<Version> {
        let mut inner = self.lock()?;
        inner.enter("create_version")?;
        if !inner.documents.contains_key(&document_id) {
            return Err(PortError::NotFound(format!(
                "Document {document_id} not found"
            )));
        }
        let versions = inner.versions.entry(document_id).or_default();
        // Next number is computed from existing rows at write time.
        let number = versions.iter().map(|v| v.number).max().unwrap_or(0) + 1;
        let version = Version {
            id: Uuid::new_v4(),
            document_id,
            number,
            body: body.to_string(),
            word_count,
            created_at: Utc::now(),
        };
        versions.push(version.clone());
        Ok(version)
    }

    async fn set_status(&self, document_id: Uuid, status: EssayStatus) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.enter("set_status")?;
        let document = inner.document_mut(document_id)?;
        document.status = status;
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn set_title(&self, document_id: Uuid, title: &str) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.enter("set_title")?;
        let document = inner.document_mut(document_id)?;
        document.title = title.to_string();
        document.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.enter("delete_document")?;
        inner
            .documents
            .remove(&document_id)
            .ok_or_else(|| PortError::NotFound(format!("Document {document_id} not found")))?;
        // Cascade.
        inner.versions.remove(&document_id);
        inner.annotations.remove(&document_id);
        Ok(())
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn create_annotation(
        &self,
        document_id: Uuid,
        author_id: Uuid,
        kind: AnnotationKind,
        content: &str,
        range: Option<TextRange>,
    ) -> PortResult<Annotation> {
        let mut inner = self.lock()?;
        inner.enter("create_annotation")?;
        if !inner.documents.contains_key(&document_id) {
            return Err(PortError::NotFound(format!(
                "Document {document_id} not found"
            )));
        }
        let annotation = Annotation {
            id: Uuid::new_v4(),
            document_id,
            author_id,
            kind,
            content: content.to_string(),
            status: AnnotationStatus::Open,
            range,
            created_at: Utc::now(),
        };
        inner
            .annotations
            .entry(document_id)
            .or_default()
            .push(annotation.clone());
        Ok(annotation)
    }

    async fn resolve_annotation(&self, annotation_id: Uuid) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.enter("resolve_annotation")?;
        for annotations in inner.annotations.values_mut() {
            if let Some(annotation) = annotations.iter_mut().find(|a| a.id == annotation_id) {
                annotation.status = AnnotationStatus::Resolved;
                return Ok(());
            }
        }
        Err(PortError::NotFound(format!(
            "Annotation {annotation_id} not found"
        )))
    }
}
