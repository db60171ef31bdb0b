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

use crate::providers::{AnthropicClient, ApiClient, OllamaClient, OpenAIClient};
use async_trait::async_trait;
use chart_contracts::{
    GatewayConfig, GatewayError, GatewayResult, GenerationRequest, Message, ModelResponse,
    Provider, ProviderRequest,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// The seam the request handlers talk to; test doubles implement it to
/// exercise the handler flows without the network.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GatewayResult<ModelResponse>;
}

/// The production gateway: one configured provider client, no automatic
/// failover. The remote call is treated as opaque, possibly slow and
/// possibly failing; every failure mode maps onto a distinct
/// [`GatewayError`] kind.
pub struct ChartModelGateway {
    client: Arc<dyn ApiClient>,
    model: String,
}

impl ChartModelGateway {
    /// Builds the configured provider's client. A provider that needs a
    /// credential without one in the environment is a configuration error;
    /// callers are expected to fail fast on it at startup rather than
    /// produce unauthenticated requests later.
    pub fn from_config(config: &GatewayConfig) -> GatewayResult<Self> {
        let client: Arc<dyn ApiClient> = match config.provider {
            Provider::Anthropic => Arc::new(AnthropicClient::new(
                required_credential(&config.provider)?,
                config.endpoint.clone(),
                None,
                Some(config.timeout_secs),
                Some(config.max_retries),
            )),
            Provider::OpenAI => Arc::new(OpenAIClient::new(
                required_credential(&config.provider)?,
                config.endpoint.clone(),
                Some(config.timeout_secs),
                Some(config.max_retries),
            )),
            Provider::Ollama => Arc::new(OllamaClient::new(
                config.endpoint.clone(),
                Some(config.timeout_secs),
                Some(config.max_retries),
            )),
        };
        info!(provider = %config.provider, model = %config.model, "model gateway initialised");
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }

    pub fn with_client(client: Arc<dyn ApiClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn build_provider_request(&self, request: &GenerationRequest) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(request.system_instruction.clone()),
                Message::system(request.data_context.clone()),
                Message::user(request.user_text.clone()),
            ],
            max_tokens: request.generation_config.max_tokens,
            temperature: request.generation_config.temperature,
            top_p: request.generation_config.top_p,
            stop_sequences: request.generation_config.stop_sequences.clone(),
        }
    }
}

fn required_credential(provider: &Provider) -> GatewayResult<String> {
    let var = provider
        .credential_var()
        .expect("provider requires a credential");
    std::env::var(var).map_err(|_| {
        GatewayError::Configuration(format!(
            "{var} is not set; the {provider} provider cannot authenticate. \
             Set it in the environment (or .env) before starting the service."
        ))
    })
}

#[async_trait]
impl ModelGateway for ChartModelGateway {
    async fn generate(&self, request: &GenerationRequest) -> GatewayResult<ModelResponse> {
        let started = std::time::Instant::now();
        let provider_request = self.build_provider_request(request);
        let provider_response = self.client.send_request(provider_request).await?;

        let latency_ms = started.elapsed().as_millis() as u64;
        info!(
            request_id = %request.id,
            provider = self.client.provider_name(),
            latency_ms,
            "model response received"
        );
        Ok(ModelResponse {
            id: Uuid::new_v4(),
            request_id: request.id,
            content: provider_response.content,
            model_used: provider_response.model,
            provider_used: self.client.provider_name().to_string(),
            usage: provider_response.usage,
            latency_ms,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chart_contracts::ProviderResponse;

    struct EchoClient;

    #[async_trait]
    impl ApiClient for EchoClient {
        async fn send_request(&self, request: ProviderRequest) -> GatewayResult<ProviderResponse> {
            Ok(ProviderResponse {
                content: request.messages.last().map(|m| m.content.clone()).unwrap_or_default(),
                model: request.model,
                usage: Default::default(),
                finish_reason: None,
                raw_response: serde_json::Value::Null,
            })
        }

        fn provider_name(&self) -> &'static str {
            "echo"
        }
    }

    #[tokio::test]
    async fn instruction_and_data_context_travel_as_system_messages() {
        let gateway = ChartModelGateway::with_client(Arc::new(EchoClient), "test-model");
        let request = GenerationRequest::new(
            "instruction".to_string(),
            "data context".to_string(),
            "user ask".to_string(),
        );
        let provider_request = gateway.build_provider_request(&request);
        assert_eq!(provider_request.messages.len(), 3);
        assert_eq!(provider_request.messages[0].role, "system");
        assert_eq!(provider_request.messages[1].content, "data context");
        assert_eq!(provider_request.messages[2].role, "user");

        let response = gateway.generate(&request).await.unwrap();
        assert_eq!(response.content, "user ask");
        assert_eq!(response.request_id, request.id);
        assert_eq!(response.provider_used, "echo");
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        std::env::remove_var("OPENAI_API_KEY");
        let err = ChartModelGateway::from_config(&GatewayConfig::new(Provider::OpenAI))
            .err()
            .expect("must fail without a credential");
        assert!(matches!(err, GatewayError::Configuration(message)
            if message.contains("OPENAI_API_KEY")));
    }
}
