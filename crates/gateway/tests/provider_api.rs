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

//! Provider clients against an HTTP double: success, server error,
//! authentication rejection and a dead endpoint.

use chart_contracts::{GatewayError, Message, ProviderRequest};
use model_gateway::{ApiClient, AnthropicClient, OpenAIClient};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(model: &str) -> ProviderRequest {
    ProviderRequest {
        model: model.to_string(),
        messages: vec![
            Message::system("You are a chart generator."),
            Message::user("draw a bar chart"),
        ],
        max_tokens: Some(128),
        temperature: Some(0.1),
        top_p: None,
        stop_sequences: None,
    }
}

#[tokio::test]
async fn openai_client_round_trips_a_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "```\nfig = px.bar(df)\n```"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 12, "total_tokens": 22}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAIClient::new(
        "test-key".to_string(),
        Some(format!("{}/v1/chat/completions", server.uri())),
        Some(5),
        Some(0),
    );
    let response = client.send_request(request("gpt-4o-mini")).await.unwrap();
    assert!(response.content.contains("px.bar"));
    assert_eq!(response.usage.total_tokens, 22);
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn anthropic_client_parses_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "no chart today"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 4, "output_tokens": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AnthropicClient::new(
        "test-key".to_string(),
        Some(format!("{}/v1/messages", server.uri())),
        None,
        Some(5),
        Some(0),
    );
    let response = client
        .send_request(request("claude-3-5-haiku-latest"))
        .await
        .unwrap();
    assert_eq!(response.content, "no chart today");
    assert_eq!(response.usage.total_tokens, 7);
}

#[tokio::test]
async fn server_errors_surface_as_provider_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(
        "test-key".to_string(),
        Some(format!("{}/v1/chat/completions", server.uri())),
        Some(5),
        Some(0),
    );
    let err = client.send_request(request("gpt-4o-mini")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Provider(_)));
}

#[tokio::test]
async fn credential_rejection_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(
        "wrong-key".to_string(),
        Some(format!("{}/v1/chat/completions", server.uri())),
        Some(5),
        Some(2),
    );
    let err = client.send_request(request("gpt-4o-mini")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Authentication(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error() {
    // Nothing listens on this port; the connection is refused immediately.
    let client = OpenAIClient::new(
        "test-key".to_string(),
        Some("http://127.0.0.1:1/v1/chat/completions".to_string()),
        Some(2),
        Some(0),
    );
    let err = client.send_request(request("gpt-4o-mini")).await.unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Network(_) | GatewayError::Timeout
    ));
}

#[tokio::test]
async fn missing_text_payload_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = OpenAIClient::new(
        "test-key".to_string(),
        Some(format!("{}/v1/chat/completions", server.uri())),
        Some(5),
        Some(0),
    );
    let err = client.send_request(request("gpt-4o-mini")).await.unwrap_err();
    assert!(matches!(err, GatewayError::MalformedResponse(_)));
}
