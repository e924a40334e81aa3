//! Server configuration parsed from environment variables.

use thiserror::Error;

use crate::{Graphviz, RenderOptions};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got \"{value}\"")]
    Invalid { var: &'static str, value: String, expected: &'static str },
    #[error("invalid default render options: {0}")]
    RenderOptions(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub graphviz: Graphviz,
    /// Applied to requests that leave an option unset.
    pub defaults: RenderOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            graphviz: Graphviz::default(),
            defaults: RenderOptions::default(),
        }
    }
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// All optional:
    /// - `SYNTHVIZ_HOST`: bind address, default `0.0.0.0`
    /// - `PORT`: default 3000
    /// - `SYNTHVIZ_DOT` / `SYNTHVIZ_NEATO`: Graphviz programs, default `dot` / `neato`
    /// - `SYNTHVIZ_FONT`: default `Fira Sans`
    /// - `SYNTHVIZ_DPI`: default 200
    /// - `SYNTHVIZ_NODE_IMAGE_SIZE`: default 200
    /// - `SYNTHVIZ_RANKDIR`: `LR` (default), `RL`, `TB` or `BT`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("SYNTHVIZ_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_number("PORT", &port)?;
        }
        if let Some(dot) = lookup("SYNTHVIZ_DOT") {
            config.graphviz.dot_program = dot;
        }
        if let Some(neato) = lookup("SYNTHVIZ_NEATO") {
            config.graphviz.neato_program = neato;
        }
        if let Some(font) = lookup("SYNTHVIZ_FONT") {
            config.defaults.fontname = font;
        }
        if let Some(dpi) = lookup("SYNTHVIZ_DPI") {
            config.defaults.dpi = parse_number("SYNTHVIZ_DPI", &dpi)?;
        }
        if let Some(size) = lookup("SYNTHVIZ_NODE_IMAGE_SIZE") {
            config.defaults.node_image_size = parse_number("SYNTHVIZ_NODE_IMAGE_SIZE", &size)?;
        }
        if let Some(rankdir) = lookup("SYNTHVIZ_RANKDIR") {
            config.defaults.rankdir = rankdir.parse().map_err(|_| ConfigError::Invalid {
                var: "SYNTHVIZ_RANKDIR",
                value: rankdir.clone(),
                expected: "one of LR, RL, TB, BT",
            })?;
        }

        config
            .defaults
            .validate()
            .map_err(|e| ConfigError::RenderOptions(e.to_string()))?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
        expected: "a positive integer",
    })
}
