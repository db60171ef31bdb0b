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

// Minimal bootstrap; all runtime logic & handlers reside in library modules.
use anyhow::{Context, Result};
use chartwright::routes::build_router;
use chartwright::{AppConfig, AppState};
use clap::Parser;
use model_gateway::ChartModelGateway;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug, Clone)]
#[command(name = "chartwright", about = "Natural-language chart generation service")]
struct Cli {
    /// Listen address override (falls back to CHARTWRIGHT_HTTP_ADDR).
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();
    let cli = Cli::parse();

    info!("chartwright starting");
    let config = AppConfig::from_env()?;

    // A provider without a usable credential must abort here, not produce
    // unauthenticated requests later.
    let gateway = ChartModelGateway::from_config(&config.gateway)
        .context("model gateway initialisation failed")?;
    let state = AppState::new(Arc::new(gateway));

    let app = build_router(state, config.body_limit_bytes);
    let addr: SocketAddr = cli
        .addr
        .unwrap_or(config.http_addr)
        .parse()
        .context("invalid listen address")?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            warn!(error = %e, %addr, "bind failed, using ephemeral");
            tokio::net::TcpListener::bind("127.0.0.1:0").await?
        }
    };
    let local = listener.local_addr()?;
    info!(%local, "listening");

    tokio::select! { _ = axum::serve(listener, app) => {} _ = tokio::signal::ctrl_c() => {} }
    info!("chartwright shutting down");
    Ok(())
}
