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

use async_trait::async_trait;
use chart_contracts::{GatewayError, GatewayResult, ProviderRequest, ProviderResponse, Usage};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::ApiClient;

/// Chat-completions client. The endpoint override makes this the client
/// for any OpenAI-compatible service (Groq and friends), not just OpenAI
/// itself.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAIClient {
    pub fn new(
        api_key: String,
        endpoint: Option<String>,
        timeout_seconds: Option<u64>,
        max_retries: Option<u32>,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_seconds.unwrap_or(30));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            endpoint: endpoint
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
            timeout,
            max_retries: max_retries.unwrap_or(3),
        }
    }

    fn build_openai_payload(&self, request: &ProviderRequest) -> Value {
        let mut payload = json!({
            "model": request.model,
            "messages": request.messages.iter().map(|msg| {
                json!({
                    "role": msg.role,
                    "content": msg.content
                })
            }).collect::<Vec<_>>()
        });

        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            payload["top_p"] = json!(top_p);
        }
        if let Some(stop) = &request.stop_sequences {
            payload["stop"] = json!(stop);
        }

        payload
    }

    fn parse_openai_response(
        &self,
        response_data: Value,
        model: String,
    ) -> GatewayResult<ProviderResponse> {
        let content = response_data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GatewayError::MalformedResponse(
                    "no message content in chat completion".to_string(),
                )
            })?;

        let usage = if let Some(usage_data) = response_data.get("usage") {
            Usage {
                prompt_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage_data["total_tokens"].as_u64().unwrap_or(0) as u32,
            }
        } else {
            Usage::default()
        };

        let finish_reason = response_data["choices"][0]["finish_reason"]
            .as_str()
            .map(|s| s.to_string());

        Ok(ProviderResponse {
            content: content.to_string(),
            model,
            usage,
            finish_reason,
            raw_response: response_data,
        })
    }

    async fn execute_request_with_retry(&self, payload: Value) -> GatewayResult<Value> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            debug!(attempt = attempt + 1, "Sending chat completion request");
            match tokio::time::timeout(
                self.timeout,
                self.client
                    .post(&self.endpoint)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .header("Content-Type", "application/json")
                    .json(&payload)
                    .send(),
            )
            .await
            {
                Ok(Ok(response)) => match response.status() {
                    status if status.is_success() => {
                        return response.json().await.map_err(|e| {
                            GatewayError::Serialisation(format!("Failed to parse response: {e}"))
                        });
                    }
                    status if status == 401 || status == 403 => {
                        let error_body = response.text().await.unwrap_or_default();
                        return Err(GatewayError::Authentication(format!(
                            "provider rejected the credential ({status}): {error_body}"
                        )));
                    }
                    status => {
                        last_error = Some(GatewayError::Provider(format!(
                            "API error {}: {}",
                            status,
                            response
                                .text()
                                .await
                                .unwrap_or_else(|_| "Unknown error".to_string())
                        )));

                        if status == 429 {
                            let wait_time = Duration::from_secs(2_u64.pow(attempt.min(5)));
                            warn!("Rate limited, waiting {:?} before retry", wait_time);
                            tokio::time::sleep(wait_time).await;
                            last_error = Some(GatewayError::RateLimit);
                        } else if status.is_client_error() {
                            break;
                        }
                    }
                },
                Ok(Err(e)) => {
                    last_error = Some(GatewayError::Network(format!("Request failed: {e}")));

                    if attempt < self.max_retries {
                        let wait_time = Duration::from_secs(2_u64.pow(attempt.min(3)));
                        tokio::time::sleep(wait_time).await;
                    }
                }
                Err(_) => {
                    last_error = Some(GatewayError::Timeout);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::Internal("Unknown error".to_string())))
    }
}

#[async_trait]
impl ApiClient for OpenAIClient {
    async fn send_request(&self, request: ProviderRequest) -> GatewayResult<ProviderResponse> {
        let payload = self.build_openai_payload(&request);
        let response_data = self.execute_request_with_retry(payload).await?;
        self.parse_openai_response(response_data, request.model)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_contracts::Message;

    #[test]
    fn payload_keeps_message_roles() {
        let client = OpenAIClient::new("key".to_string(), None, None, None);
        let request = ProviderRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![Message::system("instruction"), Message::user("chart please")],
            max_tokens: Some(2048),
            temperature: Some(0.7),
            top_p: None,
            stop_sequences: None,
        };
        let payload = client.build_openai_payload(&request);
        assert_eq!(payload["messages"][0]["role"], json!("system"));
        assert_eq!(payload["messages"][1]["content"], json!("chart please"));
        assert_eq!(payload["max_tokens"], json!(2048));
    }

    #[test]
    fn content_must_be_present() {
        let client = OpenAIClient::new("key".to_string(), None, None, None);
        let err = client
            .parse_openai_response(json!({"choices": []}), "m".to_string())
            .unwrap_err();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));
    }
}
