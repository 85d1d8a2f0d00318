//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `DocumentStore` and `FeedbackStore` ports from
//! the `core` crate. It handles all interactions with the PostgreSQL
//! database using `sqlx`.
//!
//! Every query maps into a typed record struct and from there into a
//! domain struct via `to_domain()`; no loosely-typed payloads cross this
//! boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use essay_core::domain::{
    Annotation, AnnotationKind, AnnotationStatus, Document, DocumentBundle, TextRange, Version,
};
use essay_core::ports::{DocumentStore, FeedbackStore, PortError, PortResult};
use essay_core::workflow::EssayStatus;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store ports over PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: impl FnOnce() -> String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    student_id: Uuid,
    coach_id: Option<Uuid>,
    title: String,
    prompt: String,
    body: String,
    word_count: i32,
    status: String,
    school_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    fn to_domain(self) -> PortResult<Document> {
        let status: EssayStatus = self
            .status
            .parse()
            .map_err(|e: essay_core::workflow::UnknownStatus| {
                PortError::Unexpected(e.to_string())
            })?;
        Ok(Document {
            id: self.id,
            student_id: self.student_id,
            coach_id: self.coach_id,
            title: self.title,
            prompt: self.prompt,
            body: self.body,
            word_count: self.word_count.max(0) as usize,
            status,
            school_id: self.school_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct VersionRecord {
    id: Uuid,
    document_id: Uuid,
    number: i32,
    body: String,
    word_count: i32,
    created_at: DateTime<Utc>,
}

impl VersionRecord {
    fn to_domain(self) -> Version {
        Version {
            id: self.id,
            document_id: self.document_id,
            number: self.number.max(0) as u32,
            body: self.body,
            word_count: self.word_count.max(0) as usize,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AnnotationRecord {
    id: Uuid,
    document_id: Uuid,
    author_id: Uuid,
    kind: String,
    content: String,
    status: String,
    start_offset: Option<i32>,
    end_offset: Option<i32>,
    created_at: DateTime<Utc>,
}

impl AnnotationRecord {
    fn to_domain(self) -> PortResult<Annotation> {
        let kind = match self.kind.as_str() {
            "general" => AnnotationKind::General,
            "inline" => AnnotationKind::Inline,
            other => {
                return Err(PortError::Unexpected(format!(
                    "Unknown annotation kind: {other}"
                )))
            }
        };
        let status = match self.status.as_str() {
            "open" => AnnotationStatus::Open,
            "resolved" => AnnotationStatus::Resolved,
            other => {
                return Err(PortError::Unexpected(format!(
                    "Unknown annotation status: {other}"
                )))
            }
        };
        let range = match (self.start_offset, self.end_offset) {
            (Some(start), Some(end)) => Some(TextRange {
                start: start.max(0) as usize,
                end: end.max(0) as usize,
            }),
            _ => None,
        };
        Ok(Annotation {
            id: self.id,
            document_id: self.document_id,
            author_id: self.author_id,
            kind,
            content: self.content,
            status,
            range,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for PgStore {
    async fn fetch_document(&self, document_id: Uuid) -> PortResult<DocumentBundle> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, student_id, coach_id, title, prompt, body, word_count, status, school_id, created_at, updated_at \
             FROM documents WHERE id = $1",
        )
        .bind(document_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, || format!("Document {document_id} not found")))?;

        let versions = sqlx::query_as::<_, VersionRecord>(
            "SELECT id, document_id, number, body, word_count, created_at \
             FROM versions WHERE document_id = $1 ORDER BY number ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let annotations = sqlx::query_as::<_, AnnotationRecord>(
            "SELECT id, document_id, author_id, kind, content, status, start_offset, end_offset, created_at \
             FROM annotations WHERE document_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut bundle = DocumentBundle {
            document: record.to_domain()?,
            versions: versions.into_iter().map(|r| r.to_domain()).collect(),
            annotations: annotations
                .into_iter()
                .map(|r| r.to_domain())
                .collect::<PortResult<Vec<_>>>()?,
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
        let record = sqlx::query_as::<_, DocumentRecord>(
            "INSERT INTO documents (id, student_id, title, prompt) VALUES ($1, $2, $3, $4) \
             RETURNING id, student_id, coach_id, title, prompt, body, word_count, status, school_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(title)
        .bind(prompt)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn save_body(
        &self,
        document_id: Uuid,
        body: &str,
        word_count: usize,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE documents SET body = $1, word_count = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(body)
        .bind(word_count as i32)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Document {document_id} not found"
            )));
        }
        Ok(())
    }

    async fn create_version(
        &self,
        document_id: Uuid,
        body: &str,
        word_count: usize,
    ) -> PortResult<Version> {
        // The next number is computed inside the INSERT, at write time.
        // Only the owning student's single active session writes versions,
        // so no further serialization is needed; the unique index on
        // (document_id, number) backs that assumption.
        let record = sqlx::query_as::<_, VersionRecord>(
            "INSERT INTO versions (id, document_id, number, body, word_count) \
             VALUES ($1, $2, (SELECT COALESCE(MAX(number), 0) + 1 FROM versions WHERE document_id = $2), $3, $4) \
             RETURNING id, document_id, number, body, word_count, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(document_id)
        .bind(body)
        .bind(word_count as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn set_status(&self, document_id: Uuid, status: EssayStatus) -> PortResult<()> {
        let result =
            sqlx::query("UPDATE documents SET status = $1, updated_at = NOW() WHERE id = $2")
                .bind(status.as_str())
                .bind(document_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Document {document_id} not found"
            )));
        }
        Ok(())
    }

    async fn set_title(&self, document_id: Uuid, title: &str) -> PortResult<()> {
        let result =
            sqlx::query("UPDATE documents SET title = $1, updated_at = NOW() WHERE id = $2")
                .bind(title)
                .bind(document_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Document {document_id} not found"
            )));
        }
        Ok(())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        // Versions and annotations cascade via their foreign keys.
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Document {document_id} not found"
            )));
        }
        Ok(())
    }
}

//=========================================================================================
// `FeedbackStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl FeedbackStore for PgStore {
    async fn create_annotation(
        &self,
        document_id: Uuid,
        author_id: Uuid,
        kind: AnnotationKind,
        content: &str,
        range: Option<TextRange>,
    ) -> PortResult<Annotation> {
        let kind_str = match kind {
            AnnotationKind::General => "general",
            AnnotationKind::Inline => "inline",
        };
        let record = sqlx::query_as::<_, AnnotationRecord>(
            "INSERT INTO annotations (id, document_id, author_id, kind, content, start_offset, end_offset) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, document_id, author_id, kind, content, status, start_offset, end_offset, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(document_id)
        .bind(author_id)
        .bind(kind_str)
        .bind(content)
        .bind(range.map(|r| r.start as i32))
        .bind(range.map(|r| r.end as i32))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn resolve_annotation(&self, annotation_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE annotations SET status = 'resolved' WHERE id = $1")
            .bind(annotation_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Annotation {annotation_id} not found"
            )));
        }
        Ok(())
    }
}
