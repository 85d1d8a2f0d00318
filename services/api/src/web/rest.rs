//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. Every payload is a typed
//! DTO mapped explicitly from the domain structs.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use essay_core::domain::{
    word_count, Annotation, AnnotationKind, Document, DocumentBundle, TextRange, Version,
};
use essay_core::ports::PortError;
use essay_core::workflow::EssayStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_document_handler,
        fetch_document_handler,
        save_body_handler,
        create_version_handler,
        set_status_handler,
        set_title_handler,
        delete_document_handler,
        create_annotation_handler,
        resolve_annotation_handler,
    ),
    components(
        schemas(
            CreateDocumentRequest,
            SaveBodyRequest,
            SetStatusRequest,
            SetTitleRequest,
            CreateAnnotationRequest,
            DocumentResponse,
            VersionResponse,
            AnnotationResponse,
            DocumentBundleResponse,
        )
    ),
    tags(
        (name = "Essay API", description = "Document, version, and annotation endpoints for the essay drafting & review subsystem.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateDocumentRequest {
    pub title: String,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveBodyRequest {
    pub body: String,
    /// Cached projection; derived from `body` when omitted.
    pub word_count: Option<usize>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetStatusRequest {
    /// One of: brainstorming, outline, first_draft, revision,
    /// coach_review, final.
    pub status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SetTitleRequest {
    pub title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateAnnotationRequest {
    /// "general" or "inline".
    pub kind: String,
    pub content: String,
    /// Character offsets, required for inline annotations.
    pub start: Option<usize>,
    pub end: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub coach_id: Option<Uuid>,
    pub title: String,
    pub prompt: String,
    pub body: String,
    pub word_count: usize,
    pub status: String,
    pub school_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(d: Document) -> Self {
        Self {
            id: d.id,
            student_id: d.student_id,
            coach_id: d.coach_id,
            title: d.title,
            prompt: d.prompt,
            body: d.body,
            word_count: d.word_count,
            status: d.status.to_string(),
            school_id: d.school_id,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct VersionResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub number: u32,
    pub body: String,
    pub word_count: usize,
    pub created_at: DateTime<Utc>,
}

impl From<Version> for VersionResponse {
    fn from(v: Version) -> Self {
        Self {
            id: v.id,
            document_id: v.document_id,
            number: v.number,
            body: v.body,
            word_count: v.word_count,
            created_at: v.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AnnotationResponse {
    pub id: Uuid,
    pub document_id: Uuid,
    pub author_id: Uuid,
    pub kind: String,
    pub content: String,
    pub status: String,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub created_at: DateTime<Utc>,
}

impl From<Annotation> for AnnotationResponse {
    fn from(a: Annotation) -> Self {
        Self {
            id: a.id,
            document_id: a.document_id,
            author_id: a.author_id,
            kind: match a.kind {
                AnnotationKind::General => "general".to_string(),
                AnnotationKind::Inline => "inline".to_string(),
            },
            content: a.content,
            status: match a.status {
                essay_core::domain::AnnotationStatus::Open => "open".to_string(),
                essay_core::domain::AnnotationStatus::Resolved => "resolved".to_string(),
            },
            start: a.range.map(|r| r.start),
            end: a.range.map(|r| r.end),
            created_at: a.created_at,
        }
    }
}

/// The full snapshot used on load and after coach-side mutations.
#[derive(Serialize, ToSchema)]
pub struct DocumentBundleResponse {
    pub document: DocumentResponse,
    pub versions: Vec<VersionResponse>,
    pub annotations: Vec<AnnotationResponse>,
}

impl From<DocumentBundle> for DocumentBundleResponse {
    fn from(b: DocumentBundle) -> Self {
        Self {
            document: b.document.into(),
            versions: b.versions.into_iter().map(Into::into).collect(),
            annotations: b.annotations.into_iter().map(Into::into).collect(),
        }
    }
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

type HandlerError = (StatusCode, String);

fn actor_id(headers: &HeaderMap) -> Result<Uuid, HandlerError> {
    let raw = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;
    Uuid::parse_str(raw).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

fn port_error(context: &str, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Unauthorized => (StatusCode::FORBIDDEN, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("{context}: {msg}");
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new, empty document owned by the calling student.
#[utoipa::path(
    post,
    path = "/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the student.")
    )
)]
pub async fn create_document_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let student_id = actor_id(&headers)?;
    if payload.title.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Title must not be empty".to_string(),
        ));
    }
    let document = app_state
        .documents
        .create_document(student_id, payload.title.trim(), &payload.prompt)
        .await
        .map_err(|e| port_error("Failed to create document", e))?;
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

/// Fetch the full document bundle: document, versions, annotations.
#[utoipa::path(
    get,
    path = "/documents/{id}",
    responses(
        (status = 200, description = "Full document bundle", body = DocumentBundleResponse),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn fetch_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let bundle = app_state
        .documents
        .fetch_document(id)
        .await
        .map_err(|e| port_error("Failed to fetch document", e))?;
    Ok(Json(DocumentBundleResponse::from(bundle)))
}

/// Persist the current body text. Idempotent if the body is unchanged.
#[utoipa::path(
    put,
    path = "/documents/{id}/body",
    request_body = SaveBodyRequest,
    responses(
        (status = 204, description = "Body saved"),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn save_body_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaveBodyRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let words = payload
        .word_count
        .unwrap_or_else(|| word_count(&payload.body));
    app_state
        .documents
        .save_body(id, &payload.body, words)
        .await
        .map_err(|e| port_error("Failed to save body", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Append an immutable version snapshot. Numbering is assigned at write time.
#[utoipa::path(
    post,
    path = "/documents/{id}/versions",
    request_body = SaveBodyRequest,
    responses(
        (status = 201, description = "Version created", body = VersionResponse),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_version_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaveBodyRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let words = payload
        .word_count
        .unwrap_or_else(|| word_count(&payload.body));
    let version = app_state
        .documents
        .create_version(id, &payload.body, words)
        .await
        .map_err(|e| port_error("Failed to create version", e))?;
    Ok((StatusCode::CREATED, Json(VersionResponse::from(version))))
}

/// Write a new review status. No transition legality is validated.
#[utoipa::path(
    put,
    path = "/documents/{id}/status",
    request_body = SetStatusRequest,
    responses(
        (status = 204, description = "Status updated"),
        (status = 400, description = "Unknown status name"),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn set_status_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStatusRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let status: EssayStatus = payload
        .status
        .parse()
        .map_err(|e: essay_core::workflow::UnknownStatus| {
            (StatusCode::BAD_REQUEST, e.to_string())
        })?;
    app_state
        .documents
        .set_status(id, status)
        .await
        .map_err(|e| port_error("Failed to set status", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rename the document, independent of the body.
#[utoipa::path(
    put,
    path = "/documents/{id}/title",
    request_body = SetTitleRequest,
    responses(
        (status = 204, description = "Title updated"),
        (status = 400, description = "Empty title"),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn set_title_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetTitleRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Title must not be empty".to_string(),
        ));
    }
    app_state
        .documents
        .set_title(id, title)
        .await
        .map_err(|e| port_error("Failed to set title", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete the document, cascading its versions and annotations.
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_document_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .documents
        .delete_document(id)
        .await
        .map_err(|e| port_error("Failed to delete document", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a feedback annotation, general or inline.
#[utoipa::path(
    post,
    path = "/documents/{id}/annotations",
    request_body = CreateAnnotationRequest,
    responses(
        (status = 201, description = "Annotation created", body = AnnotationResponse),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Document not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the annotation author.")
    )
)]
pub async fn create_annotation_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<CreateAnnotationRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let author_id = actor_id(&headers)?;
    if payload.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Comment text must not be empty".to_string(),
        ));
    }

    let (kind, range) = match payload.kind.as_str() {
        "general" => (AnnotationKind::General, None),
        "inline" => match (payload.start, payload.end) {
            (Some(start), Some(end)) if start < end => {
                (AnnotationKind::Inline, Some(TextRange { start, end }))
            }
            _ => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    "Inline annotations require start < end offsets".to_string(),
                ))
            }
        },
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown annotation kind: {other}"),
            ))
        }
    };

    let annotation = app_state
        .feedback
        .create_annotation(id, author_id, kind, payload.content.trim(), range)
        .await
        .map_err(|e| port_error("Failed to create annotation", e))?;
    Ok((
        StatusCode::CREATED,
        Json(AnnotationResponse::from(annotation)),
    ))
}

/// Resolve a feedback annotation. One-way; there is no reopen.
#[utoipa::path(
    post,
    path = "/annotations/{id}/resolve",
    responses(
        (status = 204, description = "Annotation resolved"),
        (status = 404, description = "Annotation not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn resolve_annotation_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .feedback
        .resolve_annotation(id)
        .await
        .map_err(|e| port_error("Failed to resolve annotation", e))?;
    Ok(StatusCode::NO_CONTENT)
}
