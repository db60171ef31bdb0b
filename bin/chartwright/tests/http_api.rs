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

//! Handler flows against the real router with a scripted gateway double.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chart_contracts::{GatewayError, GatewayResult, GenerationRequest, ModelResponse, Usage};
use chartwright::routes::build_router;
use chartwright::AppState;
use model_gateway::ModelGateway;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

struct StubGateway {
    responses: Mutex<VecDeque<GatewayResult<String>>>,
}

impl StubGateway {
    fn scripted(responses: Vec<GatewayResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }
}

#[async_trait]
impl ModelGateway for StubGateway {
    async fn generate(&self, request: &GenerationRequest) -> GatewayResult<ModelResponse> {
        let next = self
            .responses
            .lock()
            .expect("stub lock")
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Internal("no scripted response".to_string())));
        next.map(|content| ModelResponse {
            id: Uuid::new_v4(),
            request_id: request.id,
            content,
            model_used: "stub-model".to_string(),
            provider_used: "stub".to_string(),
            usage: Usage::default(),
            latency_ms: 1,
            created_at: chrono::Utc::now(),
        })
    }
}

fn router_with(responses: Vec<GatewayResult<String>>) -> Router {
    let state = AppState::new(StubGateway::scripted(responses));
    build_router(state, 10 * 1024 * 1024)
}

fn data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn upload_request(contents: &str, filename: &str, cookie: Option<&str>) -> Request<Body> {
    let body = json!({
        "contents": contents,
        "filename": filename,
        "last_modified": 1_700_000_000_i64,
    });
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialise")))
        .expect("request")
}

fn generate_request(prompt: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder
        .body(Body::from(
            serde_json::to_vec(&json!({ "prompt": prompt })).expect("serialise"),
        ))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn session_cookie(response: &axum::response::Response) -> String {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .expect("cookie text");
    header
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

const CSV: &str = "city,population\nLeeds,793\nYork,202\n";

const CHART_CODE: &str = concat!(
    "```python\n",
    "import plotly.express as px\n",
    "fig = px.bar(df, x='city', y='population')\n",
    "fig.show()\n",
    "```\n",
);

#[tokio::test]
async fn upload_returns_preview_and_issues_a_session() {
    let app = router_with(vec![]);
    let response = app
        .oneshot(upload_request(&data_url(CSV.as_bytes(), "text/csv"), "cities.csv", None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    assert!(cookie.starts_with("chartwright_session="));

    let body = body_json(response).await;
    assert_eq!(body["notice"], json!("File uploaded and processed successfully."));
    assert_eq!(body["row_count"], json!(2));
    assert_eq!(body["preview"]["headers"], json!(["city", "population"]));
    assert_eq!(body["preview"]["rows"][0][0], json!("Leeds"));
}

#[tokio::test]
async fn generate_without_a_dataset_is_conflict() {
    let app = router_with(vec![]);
    let response = app
        .oneshot(generate_request("draw something", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["kind"], json!("no_dataset"));
}

#[tokio::test]
async fn generate_executes_model_code_into_a_figure() {
    let app = router_with(vec![Ok(CHART_CODE.to_string())]);

    let upload = app
        .clone()
        .oneshot(upload_request(&data_url(CSV.as_bytes(), "text/csv"), "cities.csv", None))
        .await
        .expect("upload");
    let cookie = session_cookie(&upload);

    let response = app
        .oneshot(generate_request("bar chart of population by city", Some(&cookie)))
        .await
        .expect("generate");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["figure"]["data"][0]["type"], json!("bar"));
    assert_eq!(body["figure"]["data"][0]["x"][0], json!("Leeds"));
    assert!(body.get("content").is_none());
}

#[tokio::test]
async fn code_free_response_is_surfaced_verbatim() {
    let narrative = "I need a numeric column to draw that.";
    let app = router_with(vec![Ok(narrative.to_string())]);

    let upload = app
        .clone()
        .oneshot(upload_request(&data_url(CSV.as_bytes(), "text/csv"), "cities.csv", None))
        .await
        .expect("upload");
    let cookie = session_cookie(&upload);

    let body = body_json(
        app.oneshot(generate_request("nonsense request", Some(&cookie)))
            .await
            .expect("generate"),
    )
    .await;
    assert_eq!(body["content"], json!(narrative));
    assert!(body.get("figure").is_none());
}

#[tokio::test]
async fn gateway_failure_yields_retry_notice_and_keeps_the_dataset() {
    let app = router_with(vec![
        Err(GatewayError::Network("connection reset".to_string())),
        Ok(CHART_CODE.to_string()),
    ]);

    let upload = app
        .clone()
        .oneshot(upload_request(&data_url(CSV.as_bytes(), "text/csv"), "cities.csv", None))
        .await
        .expect("upload");
    let cookie = session_cookie(&upload);

    let first = body_json(
        app.clone()
            .oneshot(generate_request("bar chart", Some(&cookie)))
            .await
            .expect("generate"),
    )
    .await;
    assert_eq!(
        first["notice"],
        json!("The chart could not be generated. Please try again.")
    );
    assert!(first.get("figure").is_none());

    // The stored table survived the failure: the retry renders the chart.
    let second = body_json(
        app.oneshot(generate_request("bar chart", Some(&cookie)))
            .await
            .expect("generate"),
    )
    .await;
    assert_eq!(second["figure"]["data"][0]["type"], json!("bar"));
}

#[tokio::test]
async fn execution_failure_collapses_to_the_same_retry_notice() {
    let bad_code = "```python\nfig = px.bar(df, x='city', y='altitude')\n```";
    let app = router_with(vec![Ok(bad_code.to_string())]);

    let upload = app
        .clone()
        .oneshot(upload_request(&data_url(CSV.as_bytes(), "text/csv"), "cities.csv", None))
        .await
        .expect("upload");
    let cookie = session_cookie(&upload);

    let body = body_json(
        app.oneshot(generate_request("bar chart", Some(&cookie)))
            .await
            .expect("generate"),
    )
    .await;
    assert_eq!(
        body["notice"],
        json!("The chart could not be generated. Please try again.")
    );
}

#[tokio::test]
async fn failed_upload_leaves_the_previous_dataset_usable() {
    let app = router_with(vec![Ok(CHART_CODE.to_string())]);

    let upload = app
        .clone()
        .oneshot(upload_request(&data_url(CSV.as_bytes(), "text/csv"), "cities.csv", None))
        .await
        .expect("upload");
    let cookie = session_cookie(&upload);

    let rejected = app
        .clone()
        .oneshot(upload_request(
            &data_url(b"not a table", "text/plain"),
            "notes.txt",
            Some(&cookie),
        ))
        .await
        .expect("upload");
    assert_eq!(rejected.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let rejection = body_json(rejected).await;
    assert_eq!(rejection["kind"], json!("unsupported_format"));

    let body = body_json(
        app.oneshot(generate_request("bar chart", Some(&cookie)))
            .await
            .expect("generate"),
    )
    .await;
    assert_eq!(body["figure"]["data"][0]["type"], json!("bar"));
}
