//! Weaviate REST/GraphQL client.
//!
//! Objects are stored with caller-supplied vectors (`vectorizer: none`) in an
//! HNSW index using cosine distance. Retrieval uses hybrid search, mixing BM25
//! over `content` with vector similarity.

use rag_logging::{rag_debug, rag_info};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::config::{required, WeaviateSettings};
use crate::{Chunk, SearchHit};

/// Upper bound on objects per batch request.
pub const MAX_UPSERT_BATCH: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum VectorDbError {
    #[error("{0}")]
    NotConfigured(String),
    #[error("vector database request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("vector database returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("batch upsert rejected objects: {0}")]
    Batch(String),
    #[error("graphql error: {0}")]
    GraphQl(String),
    #[error("vector database response malformed: {0}")]
    Malformed(String),
    #[error("{chunks} chunks but {vectors} vectors")]
    VectorCountMismatch { chunks: usize, vectors: usize },
}

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    fn collection(&self) -> &str;

    /// Creates the collection unless it already exists.
    async fn ensure_collection(&self) -> Result<(), VectorDbError>;

    /// Removes every object stored for `url`; returns the number removed.
    async fn delete_source(&self, url: &str) -> Result<usize, VectorDbError>;

    /// Writes chunks with their vectors; returns the number written.
    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize, VectorDbError>;

    async fn search(
        &self,
        query: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorDbError>;
}

#[derive(Debug, Clone)]
pub struct WeaviateStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    class_name: String,
    alpha: f32,
}

impl WeaviateStore {
    pub fn new(settings: &WeaviateSettings, collection: &str) -> Result<Self, VectorDbError> {
        let base_url = required(settings.url.as_deref(), "WEAVIATE_URL")
            .map_err(VectorDbError::NotConfigured)?
            .trim_end_matches('/')
            .to_string();
        let api_key = required(settings.api_key.as_deref(), "WEAVIATE_API_KEY")
            .map_err(VectorDbError::NotConfigured)?
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            class_name: class_name(collection),
            alpha: settings.hybrid_alpha.clamp(0.0, 1.0),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
    }

    fn schema(&self) -> Value {
        json!({
            "class": self.class_name,
            "vectorizer": "none",
            "vectorIndexType": "hnsw",
            "vectorIndexConfig": { "distance": "cosine" },
            "properties": [
                { "name": "content", "dataType": ["text"] },
                { "name": "url", "dataType": ["text"] },
                { "name": "title", "dataType": ["text"] },
                { "name": "chunkIndex", "dataType": ["int"] }
            ]
        })
    }

    fn search_query(&self, query: &str, vector: &[f32], limit: usize) -> String {
        let query_literal = serde_json::to_string(query).unwrap_or_else(|_| "\"\"".to_string());
        let vector_literal = vector
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{{ Get {{ {class}(hybrid: {{query: {query_literal}, vector: [{vector_literal}], alpha: {alpha}}}, limit: {limit}) {{ content url title _additional {{ score }} }} }} }}",
            class = self.class_name,
            alpha = self.alpha,
        )
    }
}

#[async_trait::async_trait]
impl VectorStore for WeaviateStore {
    fn collection(&self) -> &str {
        &self.class_name
    }

    async fn ensure_collection(&self) -> Result<(), VectorDbError> {
        let path = format!("/v1/schema/{}", self.class_name);
        let response = self.request(reqwest::Method::GET, &path).send().await?;
        match response.status() {
            status if status.is_success() => {
                rag_debug!("collection {} already exists", self.class_name);
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            _ => return Err(status_error(response).await),
        }

        rag_info!("creating collection {}", self.class_name);
        let response = self
            .request(reqwest::Method::POST, "/v1/schema")
            .json(&self.schema())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }

    async fn delete_source(&self, url: &str) -> Result<usize, VectorDbError> {
        let body = json!({
            "match": {
                "class": self.class_name,
                "where": { "path": ["url"], "operator": "Equal", "valueText": url }
            },
            "output": "minimal"
        });
        let response = self
            .request(reqwest::Method::DELETE, "/v1/batch/objects")
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| VectorDbError::Malformed(err.to_string()))?;
        let count = |key: &str| body.pointer(&format!("/results/{key}")).and_then(Value::as_u64);
        if let Some(failed) = count("failed").filter(|n| *n > 0) {
            return Err(VectorDbError::Batch(format!(
                "{failed} objects from {url} were not deleted"
            )));
        }
        let deleted = count("successful").unwrap_or(0) as usize;
        rag_debug!("deleted {} previous objects for {}", deleted, url);
        Ok(deleted)
    }

    async fn upsert(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize, VectorDbError> {
        if chunks.len() != vectors.len() {
            return Err(VectorDbError::VectorCountMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }

        let mut written = 0;
        for (chunk_batch, vector_batch) in chunks
            .chunks(MAX_UPSERT_BATCH)
            .zip(vectors.chunks(MAX_UPSERT_BATCH))
        {
            let objects: Vec<Value> = chunk_batch
                .iter()
                .zip(vector_batch)
                .map(|(chunk, vector)| {
                    json!({
                        "class": self.class_name,
                        "id": chunk.id.to_string(),
                        "properties": {
                            "content": chunk.content,
                            "url": chunk.url,
                            "title": chunk.title.clone().unwrap_or_default(),
                            "chunkIndex": chunk.index,
                        },
                        "vector": vector,
                    })
                })
                .collect();

            let response = self
                .request(reqwest::Method::POST, "/v1/batch/objects")
                .json(&json!({ "objects": objects }))
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(status_error(response).await);
            }
            let results: Vec<Value> = response
                .json()
                .await
                .map_err(|err| VectorDbError::Malformed(err.to_string()))?;
            let errors = batch_errors(&results);
            if !errors.is_empty() {
                return Err(VectorDbError::Batch(errors.join("; ")));
            }
            written += chunk_batch.len();
            rag_debug!("upserted {} objects into {}", written, self.class_name);
        }
        Ok(written)
    }

    async fn search(
        &self,
        query: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorDbError> {
        let response = self
            .request(reqwest::Method::POST, "/v1/graphql")
            .json(&json!({ "query": self.search_query(query, vector, limit) }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| VectorDbError::Malformed(err.to_string()))?;
        parse_search_response(&body, &self.class_name)
    }
}

/// Weaviate class names are PascalCase: `agentic-rag` becomes `AgenticRag`.
pub fn class_name(collection: &str) -> String {
    let mut name: String = collection
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if name.is_empty() {
        name = "Documents".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, 'C');
    }
    name
}

async fn status_error(response: reqwest::Response) -> VectorDbError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "(unreadable body)".to_string());
    VectorDbError::Status { status, body }
}

fn batch_errors(results: &[Value]) -> Vec<String> {
    results
        .iter()
        .filter_map(|item| item.pointer("/result/errors/error"))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|err| err.get("message").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn parse_search_response(body: &Value, class: &str) -> Result<Vec<SearchHit>, VectorDbError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            return Err(VectorDbError::GraphQl(messages.join("; ")));
        }
    }

    let items = body
        .pointer(&format!("/data/Get/{class}"))
        .and_then(Value::as_array)
        .ok_or_else(|| VectorDbError::Malformed(format!("missing data.Get.{class}")))?;

    Ok(items
        .iter()
        .map(|item| SearchHit {
            url: str_field(item, "url").unwrap_or_default(),
            title: str_field(item, "title").filter(|t| !t.is_empty()),
            content: str_field(item, "content").unwrap_or_default(),
            score: item.pointer("/_additional/score").and_then(score_value),
        })
        .collect())
}

fn str_field(item: &Value, key: &str) -> Option<String> {
    item.get(key).and_then(Value::as_str).map(str::to_string)
}

// Hybrid scores come back as strings; tolerate numbers too.
fn score_value(value: &Value) -> Option<f32> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        _ => None,
    }
}
