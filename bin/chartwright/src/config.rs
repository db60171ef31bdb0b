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

use anyhow::{Context, Result};
use chart_contracts::{GatewayConfig, Provider};

const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

/// Uploads arrive base64-wrapped in JSON, so the limit is on the encoded
/// payload.
const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub body_limit_bytes: usize,
    pub gateway: GatewayConfig,
}

impl AppConfig {
    /// Reads configuration from the environment (after dotenvy has folded
    /// in any `.env`). Credential presence is checked later, when the
    /// gateway is built, so that the diagnostic names the provider.
    pub fn from_env() -> Result<Self> {
        let provider: Provider = std::env::var("CHARTWRIGHT_PROVIDER")
            .unwrap_or_else(|_| "openai".to_string())
            .parse()?;

        let mut gateway = GatewayConfig::new(provider);
        if let Ok(model) = std::env::var("CHARTWRIGHT_MODEL") {
            gateway = gateway.with_model(model);
        }
        if let Ok(endpoint) = std::env::var("CHARTWRIGHT_ENDPOINT") {
            gateway = gateway.with_endpoint(endpoint);
        }
        if let Ok(timeout) = std::env::var("CHARTWRIGHT_TIMEOUT_SECS") {
            let timeout: u64 = timeout
                .parse()
                .context("CHARTWRIGHT_TIMEOUT_SECS must be a number of seconds")?;
            gateway = gateway.with_timeout_secs(timeout);
        }

        let http_addr = std::env::var("CHARTWRIGHT_HTTP_ADDR")
            .unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string());
        let body_limit_bytes = match std::env::var("CHARTWRIGHT_BODY_LIMIT_BYTES") {
            Ok(value) => value
                .parse()
                .context("CHARTWRIGHT_BODY_LIMIT_BYTES must be a byte count")?,
            Err(_) => DEFAULT_BODY_LIMIT_BYTES,
        };

        Ok(Self {
            http_addr,
            body_limit_bytes,
            gateway,
        })
    }
}
