use std::time::Duration;

use rag_logging::rag_debug;
use serde::{Deserialize, Serialize};

use crate::config::{required, GeminiSettings};

/// Upper bound on texts per `batchEmbedContents` call.
pub const MAX_EMBED_BATCH: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("{0}")]
    NotConfigured(String),
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("embedding response malformed: {0}")]
    Malformed(String),
}

#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[derive(Debug, Clone, Copy)]
enum TaskType {
    Document,
    Query,
}

impl TaskType {
    fn as_str(self) -> &'static str {
        match self {
            TaskType::Document => "RETRIEVAL_DOCUMENT",
            TaskType::Query => "RETRIEVAL_QUERY",
        }
    }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[derive(Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

/// Gemini embedding model client (`text-embedding-004` by default).
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model_path: String,
    api_key: String,
}

impl GeminiEmbedder {
    pub fn new(settings: &GeminiSettings) -> Result<Self, EmbedError> {
        let api_key = required(settings.api_key.as_deref(), "GOOGLE_API_KEY")
            .map_err(EmbedError::NotConfigured)?
            .to_string();
        let model_path = format!("models/{}", settings.embed_model);
        let endpoint = format!(
            "{}/v1beta/{}:batchEmbedContents",
            settings.base_url.trim_end_matches('/'),
            model_path
        );
        Ok(Self {
            client: build_client(settings.request_timeout)?,
            endpoint,
            model_path,
            api_key,
        })
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
        task: TaskType,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = BatchRequest {
            requests: texts
                .iter()
                .map(|&text| EmbedRequest {
                    model: &self.model_path,
                    content: Content {
                        parts: [Part { text }],
                    },
                    task_type: task.as_str(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "(unreadable body)".to_string());
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BatchResponse = response
            .json()
            .await
            .map_err(|err| EmbedError::Malformed(err.to_string()))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(EmbedError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait::async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_EMBED_BATCH) {
            rag_debug!("embedding batch of {} chunks", batch.len());
            let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            vectors.extend(self.embed_batch(&refs, TaskType::Document).await?);
        }
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_batch(&[text], TaskType::Query)
            .await?
            .pop()
            .ok_or_else(|| EmbedError::Malformed("empty embedding response".into()))
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, EmbedError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
