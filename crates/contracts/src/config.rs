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

use crate::types::Provider;
use serde::{Deserialize, Serialize};

/// Default per-request timeout. The upstream transport default is not relied
/// upon; this value is explicit and overridable.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub provider: Provider,
    pub model: String,
    /// Endpoint override; lets the OpenAI client speak to any
    /// OpenAI-compatible service and the Ollama client to a remote host.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl GatewayConfig {
    pub fn new(provider: Provider) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            model,
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_provider() {
        let cfg = GatewayConfig::new(Provider::Anthropic);
        assert_eq!(cfg.model, "claude-3-5-haiku-latest");
        assert_eq!(cfg.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.max_retries, DEFAULT_MAX_RETRIES);
        assert!(cfg.endpoint.is_none());
    }

    #[test]
    fn provider_parsing_accepts_compatible_aliases() {
        use std::str::FromStr;
        assert_eq!(Provider::from_str("groq").unwrap(), Provider::OpenAI);
        assert_eq!(Provider::from_str("Anthropic").unwrap(), Provider::Anthropic);
        assert!(Provider::from_str("mystery").is_err());
    }
}
