use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::{blocking, ApiError};
use crate::error::Error;
use crate::git::DocumentSource;
use crate::models::{Document, SearchPage, SearchRequest, TocResponse};
use crate::state::AppState;

/// GET /api/search?p=&q=&n=&c= - One page of results. `c` takes precedence
/// over the other parameters.
pub async fn search(
    State(state): State<AppState>,
    Query(req): Query<SearchRequest>,
) -> Result<Json<SearchPage>, ApiError> {
    let page = blocking(move || {
        let snapshot = state.engine.snapshot();
        state.paginator.search(&snapshot, &req)
    })
    .await?;
    Ok(Json(page))
}

/// GET /api/toc - Every indexed key, sorted
pub async fn toc(State(state): State<AppState>) -> Result<Json<TocResponse>, ApiError> {
    let keys = blocking(move || state.engine.list_keys()).await?;
    Ok(Json(TocResponse {
        toc: keys.into_iter().collect(),
    }))
}

/// GET /api/docs/{*key} - A single indexed document
pub async fn get_document(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let lookup = key.clone();
    match blocking(move || state.engine.get_by_key(&lookup)).await? {
        Some(document) => Ok(Json(document)),
        None => Err((StatusCode::NOT_FOUND, format!("No document {key}"))),
    }
}

/// GET /api/files/{*key} - Raw corpus file
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let (content_type, bytes) = blocking(move || {
        let metadata = state
            .mirror
            .metadata(&key)?
            .ok_or_else(|| Error::NotFound(key.clone()))?;
        let bytes = state.mirror.read(&key)?;
        Ok((metadata.content_type, bytes))
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
