use std::time::Duration;

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::fetch::FetchSettings;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";
pub const DEFAULT_COLLECTION: &str = "agentic-rag";

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embed_model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeaviateSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Weight of the vector score against BM25 in hybrid search (1.0 = pure vector).
    pub hybrid_alpha: f32,
    pub request_timeout: Duration,
}

impl Default for WeaviateSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            hybrid_alpha: 0.5,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gemini: GeminiSettings,
    pub weaviate: WeaviateSettings,
    pub fetch: FetchSettings,
    pub collection: String,
    pub chunk_size: usize,
    pub search_limit: usize,
    pub history_turns: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiSettings::default(),
            weaviate: WeaviateSettings::default(),
            fetch: FetchSettings::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            search_limit: 5,
            history_turns: 10,
        }
    }
}

/// Returns the value when it is present and non-blank.
pub(crate) fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{name} not set"))
}
