use axum::extract::State;
use axum::Json;

use crate::api::{blocking, ApiError};
use crate::state::AppState;
use crate::sync::{SyncReport, SyncStatus};

/// POST /api/update - Pull the corpus, apply changes and drop stale keys
pub async fn update(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
    let report = blocking(move || state.sync.update_and_reconcile()).await?;
    Ok(Json(report))
}

/// GET /api/status - Whether a sync is running and the last synced version
pub async fn status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync.status())
}
