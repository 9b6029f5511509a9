//! Application configuration from environment variables (and `.env`).
//!
//! Service credentials are optional here: a missing key only fails the
//! operation that needs it.

use std::net::SocketAddr;

use rag_engine::{EngineConfig, GeminiSettings, WeaviateSettings};

use crate::platform::logging::LogDestination;

pub const DEFAULT_BIND: &str = "127.0.0.1:8501";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("RAG_BIND is not a socket address: {0:?}")]
    InvalidBind(String),
    #[error("RAG_LOG must be one of terminal, file, both; got {0:?}")]
    InvalidLogDestination(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub bind: SocketAddr,
    pub log: LogDestination,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = EngineConfig::default();

        let gemini = GeminiSettings {
            base_url: var("GEMINI_BASE_URL").unwrap_or(defaults.gemini.base_url.clone()),
            api_key: var("GOOGLE_API_KEY"),
            chat_model: var("GEMINI_CHAT_MODEL").unwrap_or(defaults.gemini.chat_model.clone()),
            embed_model: var("GEMINI_EMBED_MODEL").unwrap_or(defaults.gemini.embed_model.clone()),
            ..defaults.gemini.clone()
        };
        let weaviate = WeaviateSettings {
            url: var("WEAVIATE_URL"),
            api_key: var("WEAVIATE_API_KEY"),
            ..defaults.weaviate.clone()
        };

        let engine = EngineConfig {
            gemini,
            weaviate,
            collection: var("RAG_COLLECTION").unwrap_or(defaults.collection.clone()),
            chunk_size: number(var("RAG_CHUNK_SIZE"), "RAG_CHUNK_SIZE", defaults.chunk_size)?,
            search_limit: number(var("RAG_SEARCH_LIMIT"), "RAG_SEARCH_LIMIT", defaults.search_limit)?,
            history_turns: number(
                var("RAG_HISTORY_TURNS"),
                "RAG_HISTORY_TURNS",
                defaults.history_turns,
            )?,
            ..defaults
        };

        let bind_text = var("RAG_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_text
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_text.clone()))?;

        let log = match var("RAG_LOG") {
            None => LogDestination::Terminal,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "terminal" => LogDestination::Terminal,
                "file" => LogDestination::File,
                "both" => LogDestination::Both,
                _ => return Err(ConfigError::InvalidLogDestination(value)),
            },
        };

        Ok(Self { engine, bind, log })
    }
}

fn number(value: Option<String>, name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match value {
        None => Ok(default),
        Some(text) => match text.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::InvalidNumber { name, value: text }),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind.to_string(), DEFAULT_BIND);
        assert_eq!(cfg.log, LogDestination::Terminal);
        assert_eq!(cfg.engine.collection, "agentic-rag");
        assert_eq!(cfg.engine.chunk_size, 5000);
        assert_eq!(cfg.engine.search_limit, 5);
        assert_eq!(cfg.engine.history_turns, 10);
        assert_eq!(cfg.engine.gemini.api_key, None);
        assert_eq!(cfg.engine.weaviate.url, None);
    }

    #[test]
    fn credentials_and_overrides_are_read() {
        let cfg = config(&[
            ("WEAVIATE_URL", "https://cluster.example"),
            ("WEAVIATE_API_KEY", "wv"),
            ("GOOGLE_API_KEY", "g"),
            ("GEMINI_CHAT_MODEL", "gemini-pro"),
            ("RAG_COLLECTION", "docs"),
            ("RAG_SEARCH_LIMIT", "3"),
            ("RAG_BIND", "0.0.0.0:9000"),
            ("RAG_LOG", "Both"),
        ])
        .unwrap();
        assert_eq!(cfg.engine.weaviate.url.as_deref(), Some("https://cluster.example"));
        assert_eq!(cfg.engine.weaviate.api_key.as_deref(), Some("wv"));
        assert_eq!(cfg.engine.gemini.api_key.as_deref(), Some("g"));
        assert_eq!(cfg.engine.gemini.chat_model, "gemini-pro");
        assert_eq!(cfg.engine.gemini.embed_model, "text-embedding-004");
        assert_eq!(cfg.engine.collection, "docs");
        assert_eq!(cfg.engine.search_limit, 3);
        assert_eq!(cfg.bind.port(), 9000);
        assert_eq!(cfg.log, LogDestination::Both);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("GOOGLE_API_KEY", "  "), ("RAG_CHUNK_SIZE", "")]).unwrap();
        assert_eq!(cfg.engine.gemini.api_key, None);
        assert_eq!(cfg.engine.chunk_size, 5000);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            config(&[("RAG_CHUNK_SIZE", "0")]).unwrap_err(),
            ConfigError::InvalidNumber {
                name: "RAG_CHUNK_SIZE",
                value: "0".into()
            }
        );
        assert!(matches!(
            config(&[("RAG_BIND", "localhost")]),
            Err(ConfigError::InvalidBind(_))
        ));
        assert!(matches!(
            config(&[("RAG_LOG", "syslog")]),
            Err(ConfigError::InvalidLogDestination(_))
        ));
    }
}
