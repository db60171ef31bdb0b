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
use tracing::{debug, info, warn};

use super::ApiClient;

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    endpoint: String,
    api_version: String,
    timeout: Duration,
    max_retries: u32,
}

impl AnthropicClient {
    pub fn new(
        api_key: String,
        endpoint: Option<String>,
        api_version: Option<String>,
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
                .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".to_string()),
            api_version: api_version.unwrap_or_else(|| "2023-06-01".to_string()),
            timeout,
            max_retries: max_retries.unwrap_or(3),
        }
    }

    fn build_anthropic_payload(&self, request: &ProviderRequest) -> Value {
        let mut system_content = Vec::new();
        let mut regular_messages = Vec::new();

        for msg in &request.messages {
            if msg.role == "system" {
                system_content.push(msg.content.clone());
            } else {
                regular_messages.push(json!({
                    "role": msg.role,
                    "content": msg.content
                }));
            }
        }

        let mut payload = json!({
            "model": request.model,
            "messages": regular_messages
        });

        if !system_content.is_empty() {
            payload["system"] = json!(system_content.join("\n\n"));
        }

        payload["max_tokens"] = json!(request.max_tokens.unwrap_or(4096));
        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            payload["top_p"] = json!(top_p);
        }
        if let Some(stop) = &request.stop_sequences {
            payload["stop_sequences"] = json!(stop);
        }

        payload
    }

    fn parse_anthropic_response(
        &self,
        response_data: Value,
        model: String,
    ) -> GatewayResult<ProviderResponse> {
        let content = response_data["content"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                GatewayError::MalformedResponse(
                    "no text block in Anthropic response content".to_string(),
                )
            })?;

        let usage = if let Some(usage_data) = response_data.get("usage") {
            Usage {
                prompt_tokens: usage_data["input_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage_data["output_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage_data["input_tokens"].as_u64().unwrap_or(0) as u32
                    + usage_data["output_tokens"].as_u64().unwrap_or(0) as u32,
            }
        } else {
            Usage::default()
        };

        let finish_reason = response_data["stop_reason"].as_str().map(|s| s.to_string());

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
            debug!(
                attempt = attempt + 1,
                max_retries = self.max_retries + 1,
                "Sending request to Anthropic API"
            );

            let response = tokio::time::timeout(
                self.timeout,
                self.client
                    .post(&self.endpoint)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", &self.api_version)
                    .header("content-type", "application/json")
                    .json(&payload)
                    .send(),
            )
            .await;

            match response {
                Ok(Ok(resp)) => {
                    let status = resp.status();
                    info!("Received response from Anthropic API: {}", status);

                    if status.is_success() {
                        match resp.json::<Value>().await {
                            Ok(data) => return Ok(data),
                            Err(e) => {
                                last_error = Some(GatewayError::Serialisation(format!(
                                    "Failed to parse JSON response: {e}"
                                )));
                            }
                        }
                    } else if status == 401 || status == 403 {
                        let error_body = resp.text().await.unwrap_or_default();
                        return Err(GatewayError::Authentication(format!(
                            "Anthropic rejected the credential ({status}): {error_body}"
                        )));
                    } else if status == 429 {
                        let wait_time = Duration::from_secs(2_u64.pow(attempt.min(5)));
                        warn!(
                            "Rate limited by Anthropic API, waiting {:?} before retry",
                            wait_time
                        );
                        tokio::time::sleep(wait_time).await;
                        last_error = Some(GatewayError::RateLimit);
                    } else {
                        let error_body = resp
                            .text()
                            .await
                            .unwrap_or_else(|_| "failed to read error body".to_string());
                        last_error = Some(GatewayError::Provider(format!(
                            "Anthropic API error {status}: {error_body}"
                        )));
                        if status.is_client_error() {
                            break;
                        }
                    }
                }
                Ok(Err(e)) => {
                    last_error = Some(GatewayError::Network(format!("Request failed: {e}")));
                }
                Err(_) => {
                    warn!(
                        "Request to Anthropic API timed out after {} seconds",
                        self.timeout.as_secs()
                    );
                    last_error = Some(GatewayError::Timeout);
                }
            }

            if attempt < self.max_retries {
                let wait_time = Duration::from_secs(2_u64.pow(attempt.min(3)));
                tokio::time::sleep(wait_time).await;
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::Internal("Unknown error".to_string())))
    }
}

#[async_trait]
impl ApiClient for AnthropicClient {
    async fn send_request(&self, request: ProviderRequest) -> GatewayResult<ProviderResponse> {
        let payload = self.build_anthropic_payload(&request);
        let response_data = self.execute_request_with_retry(payload).await?;
        self.parse_anthropic_response(response_data, request.model)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}
