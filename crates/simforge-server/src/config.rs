// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server configuration.

use std::net::SocketAddr;

use simforge_engine::Config;
use simforge_engine::config::ConfigError;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8082";

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP bind address (`SIMFORGE_HTTP_ADDR`, default `0.0.0.0:8082`).
    pub http_addr: SocketAddr,
    /// Engine settings.
    pub engine: Config,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = parse_addr(std::env::var("SIMFORGE_HTTP_ADDR").ok())?;
        let engine = Config::from_env()?;
        Ok(Self { http_addr, engine })
    }
}

fn parse_addr(value: Option<String>) -> Result<SocketAddr, ConfigError> {
    let value = value.unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
    value.parse().map_err(|_| ConfigError::InvalidValue {
        var: "SIMFORGE_HTTP_ADDR",
        value,
    })
}
