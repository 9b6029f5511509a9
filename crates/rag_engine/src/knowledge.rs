use std::sync::Arc;

use rag_logging::{rag_info, rag_warn};

use crate::chunk::chunk_document;
use crate::document::{DecodeError, DocumentBuilder};
use crate::embedding::{EmbedError, Embedder};
use crate::fetch::{Fetcher, ProgressSink};
use crate::vectordb::{VectorDbError, VectorStore};
use crate::{Chunk, FetchError, LoadProgress, SearchHit, Stage};

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },
    #[error("no text content found at the given URLs")]
    NoContent,
    #[error(transparent)]
    Embed(#[from] EmbedError),
    #[error(transparent)]
    VectorDb(#[from] VectorDbError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub collection: String,
    pub urls: Vec<String>,
    pub documents: usize,
    pub chunks: usize,
}

/// A loaded, searchable knowledge base over a set of URLs.
pub struct UrlKnowledge {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    urls: Vec<String>,
}

impl UrlKnowledge {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, urls: Vec<String>) -> Self {
        Self {
            embedder,
            store,
            urls,
        }
    }

    pub fn collection(&self) -> &str {
        self.store.collection()
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, KnowledgeError> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self.store.search(query, &vector, limit).await?;
        rag_info!("knowledge search returned {} hits", hits.len());
        Ok(hits)
    }
}

/// Fetch → decode/extract/convert → chunk → embed → upsert.
pub struct KnowledgeLoader {
    fetcher: Arc<dyn Fetcher>,
    builder: DocumentBuilder,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chunk_size: usize,
}

impl KnowledgeLoader {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chunk_size: usize,
    ) -> Self {
        Self {
            fetcher,
            builder: DocumentBuilder::default(),
            embedder,
            store,
            chunk_size,
        }
    }

    /// Loads `urls` in order. Any failure aborts the whole load.
    pub async fn load(
        &self,
        urls: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<(UrlKnowledge, LoadReport), KnowledgeError> {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut sources: Vec<String> = Vec::new();
        let mut documents = 0;

        for url in urls {
            sink.emit(LoadProgress::stage(url, Stage::Queued));
            let fetched = self
                .fetcher
                .fetch(url, sink)
                .await
                .map_err(|source| KnowledgeError::Fetch {
                    url: url.clone(),
                    source,
                })?;

            sink.emit(LoadProgress::stage(url, Stage::Converting));
            let document = self
                .builder
                .build(&fetched)
                .map_err(|source| KnowledgeError::Decode {
                    url: url.clone(),
                    source,
                })?;

            if !sources.contains(&document.url) {
                sources.push(document.url.clone());
            }
            let doc_chunks = chunk_document(&document, self.chunk_size);
            sink.emit(LoadProgress {
                chunks: Some(doc_chunks.len()),
                ..LoadProgress::stage(url, Stage::Chunking)
            });
            if doc_chunks.is_empty() {
                rag_warn!("{} produced no text", url);
                continue;
            }
            documents += 1;
            chunks.extend(doc_chunks);
        }

        if chunks.is_empty() {
            return Err(KnowledgeError::NoContent);
        }

        self.store.ensure_collection().await?;

        for url in urls {
            sink.emit(LoadProgress::stage(url, Stage::Embedding));
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;

        // Chunk ids are positional; a page that shrank would keep its old tail.
        for source in &sources {
            self.store.delete_source(source).await?;
        }

        for url in urls {
            sink.emit(LoadProgress::stage(url, Stage::Upserting));
        }
        let written = self.store.upsert(&chunks, &vectors).await?;

        for url in urls {
            sink.emit(LoadProgress::stage(url, Stage::Done));
        }
        rag_info!(
            "loaded {} documents ({} chunks) into {}",
            documents,
            written,
            self.store.collection()
        );

        let report = LoadReport {
            collection: self.store.collection().to_string(),
            urls: urls.to_vec(),
            documents,
            chunks: written,
        };
        let knowledge = UrlKnowledge::new(self.embedder.clone(), self.store.clone(), urls.to_vec());
        Ok((knowledge, report))
    }
}
