// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::present::{
    no_dataset, upload_failure, GenerateResponse, UploadResponse, UPLOAD_SUCCESS_NOTICE,
};
use crate::session::{attach_session_cookie, ensure_session, session_from_headers};
use crate::state::{AppState, DatasetState, LoadedDataset};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chartgen::{compose, prepare_fragment, Extraction, Interpreter, PREVIEW_ROWS};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tabula::{decode_data_url, load_table, profile_table, LoadError, ProfilingConfig};
use tracing::{info, warn};
use uuid::Uuid;

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/upload", post(upload))
        .route("/api/generate", post(generate))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("assets/index.html"))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// Base64 payload with a MIME-type prefix before the comma separator,
    /// exactly as the browser's FileReader produces it.
    pub contents: String,
    pub filename: String,
    #[serde(default)]
    pub last_modified: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UploadRequest>,
) -> Response {
    let (session, fresh_session) = ensure_session(&headers);

    let response = match process_upload(&state, session, &request) {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(error) => {
            warn!(source = %request.filename, error = %error, "upload failed");
            let (status, notice) = upload_failure(&error);
            (status, Json(notice)).into_response()
        }
    };
    if fresh_session {
        attach_session_cookie(response, session)
    } else {
        response
    }
}

/// Decode, parse, profile, serialise, store. Failure at any step leaves the
/// session's previous dataset untouched.
fn process_upload(
    state: &AppState,
    session: Uuid,
    request: &UploadRequest,
) -> Result<UploadResponse, LoadError> {
    let bytes = decode_data_url(&request.contents)?;
    let table = load_table(&bytes, &request.filename)?;
    let serialization = table.to_csv()?;
    let profiles = profile_table(&table, &ProfilingConfig::default());

    let preview = table.preview(PREVIEW_ROWS);
    let row_count = table.row_count();
    state.store_dataset(
        session,
        LoadedDataset {
            table,
            serialization,
            profiles,
            source_name: request.filename.clone(),
            uploaded_at: Utc::now(),
        },
    );
    info!(session = %session, source = %request.filename, rows = row_count, "dataset stored");

    Ok(UploadResponse {
        notice: UPLOAD_SUCCESS_NOTICE.to_string(),
        source_name: request.filename.clone(),
        row_count,
        preview,
        last_modified: request.last_modified,
    })
}

async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let dataset = session_from_headers(&headers).map(|session| state.dataset(session));
    let Some(DatasetState::Loaded(dataset)) = dataset else {
        let (status, notice) = no_dataset();
        return (status, Json(notice)).into_response();
    };

    let generation = compose(
        &dataset.source_name,
        &dataset.serialization,
        &dataset.profiles,
        &request.prompt,
    );

    let body = match state.gateway.generate(&generation).await {
        Err(error) => {
            warn!(request_id = %generation.id, error = %error, "gateway call failed");
            GenerateResponse::retry()
        }
        Ok(model_response) => {
            match prepare_fragment(&model_response.content, &dataset.table.column_names()) {
                Extraction::Narrative(text) => GenerateResponse::narrative(text),
                Extraction::Code(code) => {
                    let interpreter = Interpreter::new(&dataset.table, &dataset.source_name);
                    match interpreter.execute(&code) {
                        Ok(figure) => GenerateResponse::figure(figure),
                        Err(error) => {
                            warn!(request_id = %generation.id, error = %error, "execution failed");
                            GenerateResponse::retry()
                        }
                    }
                }
            }
        }
    };
    (StatusCode::OK, Json(body)).into_response()
}
