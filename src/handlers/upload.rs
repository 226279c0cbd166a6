// src/handlers/upload.rs
use std::sync::Arc;

use axum::extract::{multipart::Multipart, DefaultBodyLimit, Query};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::dataset::DatasetSummary;
use crate::sheets;
use crate::AppState;

pub fn upload_routes() -> Router {
    Router::new()
        .route("/api/upload", post(upload_files))
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024)) // 25MB per upload request
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub session: Option<Uuid>,
}

/// Accepts one or more spreadsheet files and parses each into a dataset of
/// the session. Files that are unsupported or unreadable are reported per
/// file; the valid ones still load.
async fn upload_files(
    Query(query): Query<UploadQuery>,
    Extension(state): Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let (session_id, session) = state.sessions.get_or_create(query.session).await;

    let mut loaded: Vec<DatasetSummary> = Vec::new();
    let mut rejected: Vec<serde_json::Value> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::InvalidRequest(format!("malformed multipart body: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ServiceError::InvalidRequest(format!("failed to read '{filename}': {e}")))?;

        match sheets::parse_dataset(&filename, &data) {
            Ok(dataset) => {
                tracing::info!(
                    session = %session_id,
                    "loaded '{}' ({} rows)",
                    dataset.filename,
                    dataset.row_count()
                );
                loaded.push(DatasetSummary::from(&dataset));
                session.lock().await.add_dataset(dataset);
            }
            Err(err) => {
                tracing::warn!(session = %session_id, "rejected '{}': {}", filename, err);
                rejected.push(json!({
                    "filename": filename,
                    "error": err.to_string(),
                }));
            }
        }
    }

    if loaded.is_empty() && rejected.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "no files in upload".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": !loaded.is_empty(),
        "session_id": session_id,
        "datasets": loaded,
        "rejected": rejected,
    })))
}
