use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::intake::{validate, ValidationOutcome, ValidationPolicy};
use crate::models::upload::CandidateFile;
use crate::session::{HandOff, SessionSnapshot, SharedSession};
use crate::state::AppState;

const FILE_FIELD: &str = "file";

#[derive(Deserialize)]
pub struct SummaryEdit {
    pub summary: String,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.sessions.create().await;
    let snapshot = session.lock().await.snapshot();
    info!(session = %snapshot.id, "session created");
    (StatusCode::CREATED, Json(snapshot))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find(&state, id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {id} not found")))
    }
}

/// POST /api/v1/sessions/:id/file
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let session = find(&state, id).await?;
    let file = read_candidate(multipart).await?;
    if let Err(e) = validate(&file, &state.policy) {
        info!(session = %id, name = %file.name, "upload rejected: {e}");
        return Err(e.into());
    }
    let snapshot = state.pipeline.start(&session, file).await;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// POST /api/v1/intake/validate
pub async fn handle_validate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ValidationOutcome>, AppError> {
    let file = read_candidate(multipart).await?;
    Ok(Json(ValidationOutcome::of(&file, &state.policy)))
}

/// GET /api/v1/policy
pub async fn handle_get_policy(State(state): State<AppState>) -> Json<ValidationPolicy> {
    Json(state.policy.as_ref().clone())
}

/// PUT /api/v1/sessions/:id/summary
pub async fn handle_edit_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SummaryEdit>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find(&state, id).await?;
    let mut guard = session.lock().await;
    guard.edit_summary(req.summary)?;
    Ok(Json(guard.snapshot()))
}

/// POST /api/v1/sessions/:id/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let session = find(&state, id).await?;
    let snapshot = state.pipeline.analyze(&session).await?;
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

/// POST /api/v1/sessions/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = find(&state, id).await?;
    let mut guard = session.lock().await;
    guard.reset();
    Ok(Json(guard.snapshot()))
}

/// POST /api/v1/sessions/:id/continue
///
/// Score and suggestions travel with the hand-off; the session is discarded.
pub async fn handle_continue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HandOff>, AppError> {
    let session = find(&state, id).await?;
    let hand_off = session
        .lock()
        .await
        .hand_off(&state.config.next_step_path)?;
    state.sessions.remove(id).await;
    Ok(Json(hand_off))
}

async fn find(state: &AppState, id: Uuid) -> Result<SharedSession, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

/// Reads the first `file` field. Missing file names and content types become
/// empty strings, which the intake gate then rejects on type.
async fn read_candidate(mut multipart: Multipart) -> Result<CandidateFile, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let media_type = field.content_type().unwrap_or_default().to_string();
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        return Ok(CandidateFile::new(name, media_type, content));
    }
    Err(AppError::Validation(format!(
        "Missing multipart field '{FILE_FIELD}'"
    )))
}
