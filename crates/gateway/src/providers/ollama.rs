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
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use super::ApiClient;

/// Local-model client; no credential, a longer default timeout.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        timeout_seconds: Option<u64>,
        max_retries: Option<u32>,
    ) -> Self {
        let timeout = Duration::from_secs(timeout_seconds.unwrap_or(60));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            timeout,
            max_retries: max_retries.unwrap_or(3),
        }
    }

    fn build_ollama_payload(&self, request: &ProviderRequest) -> Value {
        let mut payload = json!({
            "model": request.model,
            "messages": request.messages.iter().map(|msg| {
                json!({
                    "role": msg.role,
                    "content": msg.content
                })
            }).collect::<Vec<_>>(),
            "stream": false
        });

        let mut options = json!({});
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            options["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            options["top_p"] = json!(top_p);
        }
        if let Some(stop) = &request.stop_sequences {
            options["stop"] = json!(stop);
        }
        if !options.as_object().map(Map::is_empty).unwrap_or(true) {
            payload["options"] = options;
        }

        payload
    }

    fn parse_ollama_response(
        &self,
        response_data: Value,
        model: String,
    ) -> GatewayResult<ProviderResponse> {
        let content = response_data["message"]["content"].as_str().ok_or_else(|| {
            GatewayError::MalformedResponse("no message content in Ollama response".to_string())
        })?;

        let usage = Usage {
            prompt_tokens: response_data["prompt_eval_count"].as_u64().unwrap_or(0) as u32,
            completion_tokens: response_data["eval_count"].as_u64().unwrap_or(0) as u32,
            total_tokens: response_data["prompt_eval_count"].as_u64().unwrap_or(0) as u32
                + response_data["eval_count"].as_u64().unwrap_or(0) as u32,
        };

        let finish_reason = if response_data["done"].as_bool().unwrap_or(false) {
            Some("stop".to_string())
        } else {
            None
        };

        Ok(ProviderResponse {
            content: content.to_string(),
            model,
            usage,
            finish_reason,
            raw_response: response_data,
        })
    }

    async fn execute_request_with_retry(&self, payload: Value) -> GatewayResult<Value> {
        let endpoint = format!("{}/api/chat", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            debug!(attempt = attempt + 1, %endpoint, "Sending request to Ollama");
            match tokio::time::timeout(
                self.timeout,
                self.client.post(&endpoint).json(&payload).send(),
            )
            .await
            {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json().await.map_err(|e| {
                            GatewayError::Serialisation(format!("Failed to parse response: {e}"))
                        });
                    }
                    last_error = Some(GatewayError::Provider(format!(
                        "Ollama API error {}: {}",
                        status,
                        response.text().await.unwrap_or_default()
                    )));
                    if status.is_client_error() {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    last_error = Some(GatewayError::Network(format!("Request failed: {e}")));
                }
                Err(_) => {
                    last_error = Some(GatewayError::Timeout);
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt.min(3)))).await;
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::Internal("Unknown error".to_string())))
    }
}

#[async_trait]
impl ApiClient for OllamaClient {
    async fn send_request(&self, request: ProviderRequest) -> GatewayResult<ProviderResponse> {
        let payload = self.build_ollama_payload(&request);
        let response_data = self.execute_request_with_retry(payload).await?;
        self.parse_ollama_response(response_data, request.model)
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_contracts::Message;

    #[test]
    fn options_are_omitted_when_unset() {
        let client = OllamaClient::new(None, None, None);
        let request = ProviderRequest {
            model: "llama3".to_string(),
            messages: vec![Message::user("hello")],
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
        };
        let payload = client.build_ollama_payload(&request);
        assert!(payload.get("options").is_none());
        assert_eq!(payload["stream"], json!(false));
    }

    #[test]
    fn generation_settings_land_in_options() {
        let client = OllamaClient::new(None, None, None);
        let request = ProviderRequest {
            model: "llama3".to_string(),
            messages: vec![Message::user("hello")],
            max_tokens: Some(256),
            temperature: Some(0.2),
            top_p: None,
            stop_sequences: None,
        };
        let payload = client.build_ollama_payload(&request);
        assert_eq!(payload["options"]["num_predict"], json!(256));
        assert_eq!(payload["options"]["temperature"], json!(0.2));
    }
}
