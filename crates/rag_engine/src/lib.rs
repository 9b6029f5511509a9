//! URL knowledge engine: fetching, document conversion, chunking, the Gemini
//! and Weaviate clients, and the retrieval-augmented agent.
mod agent;
mod chunk;
mod config;
mod document;
mod embedding;
mod engine;
mod fetch;
mod knowledge;
mod llm;
mod types;
mod vectordb;

pub use agent::{AgentError, AgentSettings, RagAgent, RunEvent, RunStream};
pub use chunk::{chunk_document, chunk_text, DEFAULT_CHUNK_SIZE};
pub use config::{
    EngineConfig, GeminiSettings, WeaviateSettings, DEFAULT_CHAT_MODEL, DEFAULT_COLLECTION,
    DEFAULT_EMBED_MODEL, DEFAULT_GEMINI_BASE_URL,
};
pub use document::{
    decode_body, Converter, DecodeError, DecodedText, DocumentBuilder, ExtractedContent, Extractor,
    Html2MdConverter, MainContentExtractor,
};
pub use embedding::{EmbedError, Embedder, GeminiEmbedder, MAX_EMBED_BATCH};
pub use engine::Engine;
pub use fetch::{FetchSettings, Fetcher, LogProgressSink, ProgressSink, ReqwestFetcher};
pub use knowledge::{KnowledgeError, KnowledgeLoader, LoadReport, UrlKnowledge};
pub use llm::{
    parse_sse_line, ChatMessage, ChatModel, ChatRequest, ChatRole, GeminiChat, LlmError,
    SseLineBuffer, TextStream,
};
pub use types::{
    Chunk, Document, FailureKind, FetchError, FetchMetadata, FetchOutput, LoadProgress, SearchHit,
    Stage,
};
pub use vectordb::{class_name, VectorDbError, VectorStore, WeaviateStore, MAX_UPSERT_BATCH};
