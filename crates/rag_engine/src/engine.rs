use std::sync::Arc;

use rag_logging::rag_info;

use crate::agent::{AgentError, AgentSettings, RagAgent, RunStream};
use crate::config::EngineConfig;
use crate::embedding::{Embedder, GeminiEmbedder};
use crate::fetch::{Fetcher, ProgressSink, ReqwestFetcher};
use crate::knowledge::{KnowledgeError, KnowledgeLoader, LoadReport, UrlKnowledge};
use crate::llm::{ChatMessage, ChatModel, GeminiChat};
use crate::vectordb::{VectorStore, WeaviateStore};

/// Entry point for the app: builds service clients from configuration when
/// an operation is invoked, so missing credentials surface as that
/// operation's error rather than at startup.
pub struct Engine {
    config: EngineConfig,
    fetcher: Arc<dyn Fetcher>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let fetcher = Arc::new(ReqwestFetcher::new(config.fetch.clone()));
        Self { config, fetcher }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn load_knowledge(
        &self,
        urls: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<(Arc<UrlKnowledge>, LoadReport), KnowledgeError> {
        let store: Arc<dyn VectorStore> = Arc::new(WeaviateStore::new(
            &self.config.weaviate,
            &self.config.collection,
        )?);
        let embedder: Arc<dyn Embedder> = Arc::new(GeminiEmbedder::new(&self.config.gemini)?);
        rag_info!("loading {} urls into {}", urls.len(), store.collection());

        let loader = KnowledgeLoader::new(self.fetcher.clone(), embedder, store, self.config.chunk_size);
        let (knowledge, report) = loader.load(urls, sink).await?;
        Ok((Arc::new(knowledge), report))
    }

    pub async fn ask(
        &self,
        query: &str,
        history: &[ChatMessage],
        knowledge: Option<Arc<UrlKnowledge>>,
    ) -> Result<RunStream, AgentError> {
        let knowledge = knowledge.ok_or(AgentError::KnowledgeBaseUnset)?;
        let model: Arc<dyn ChatModel> = Arc::new(GeminiChat::new(&self.config.gemini)?);
        let agent = RagAgent::new(model, self.agent_settings());
        agent.run(query, history, Some(knowledge)).await
    }

    fn agent_settings(&self) -> AgentSettings {
        AgentSettings {
            search_limit: self.config.search_limit,
            history_turns: self.config.history_turns,
            markdown: true,
        }
    }
}
