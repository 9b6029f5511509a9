use std::sync::Arc;

use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use rag_logging::rag_info;

use crate::knowledge::{KnowledgeError, UrlKnowledge};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, LlmError};
use crate::SearchHit;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    RunStarted,
    KnowledgeSearched { hits: Vec<SearchHit> },
    Content { text: String },
    RunCompleted,
}

impl RunEvent {
    pub fn content(&self) -> Option<&str> {
        match self {
            RunEvent::Content { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Knowledge base not loaded. Load it first.")]
    KnowledgeBaseUnset,
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub type RunStream = BoxStream<'static, Result<RunEvent, AgentError>>;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub search_limit: usize,
    pub history_turns: usize,
    pub markdown: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            search_limit: 5,
            history_turns: 10,
            markdown: true,
        }
    }
}

const INSTRUCTIONS: &str = "You answer questions about web pages the user loaded into a knowledge base. \
Ground your answer in the passages provided with each question and mention the source URLs you used. \
If the passages do not contain the answer, say so instead of guessing.";

/// Retrieval-augmented chat agent: searches the knowledge base, then streams
/// the model's answer.
pub struct RagAgent {
    model: Arc<dyn ChatModel>,
    settings: AgentSettings,
}

impl RagAgent {
    pub fn new(model: Arc<dyn ChatModel>, settings: AgentSettings) -> Self {
        Self { model, settings }
    }

    /// Starts a run. Without a knowledge base nothing is searched or sent and
    /// the call fails with [`AgentError::KnowledgeBaseUnset`].
    pub async fn run(
        &self,
        query: &str,
        history: &[ChatMessage],
        knowledge: Option<Arc<UrlKnowledge>>,
    ) -> Result<RunStream, AgentError> {
        let knowledge = knowledge.ok_or(AgentError::KnowledgeBaseUnset)?;
        let hits = knowledge.search(query, self.settings.search_limit).await?;
        let request = self.build_request(query, history, &hits);
        rag_info!(
            "agent run: {} history messages, {} passages",
            request.messages.len() - 1,
            hits.len()
        );
        let text = self.model.stream(request).await?;

        let head = stream::iter([
            Ok(RunEvent::RunStarted),
            Ok(RunEvent::KnowledgeSearched { hits }),
        ]);
        let body = text.map(|fragment| {
            fragment
                .map(|text| RunEvent::Content { text })
                .map_err(AgentError::from)
        });
        let tail = stream::once(async { Ok(RunEvent::RunCompleted) });

        let events = head.chain(body).chain(tail).scan(false, |failed, item| {
            if *failed {
                return futures_util::future::ready(None);
            }
            *failed = item.is_err();
            futures_util::future::ready(Some(item))
        });
        Ok(events.boxed())
    }

    fn build_request(&self, query: &str, history: &[ChatMessage], hits: &[SearchHit]) -> ChatRequest {
        let mut system = INSTRUCTIONS.to_string();
        if self.settings.markdown {
            system.push_str(" Use markdown to format your answers.");
        }

        let skip = history.len().saturating_sub(self.settings.history_turns);
        let mut messages: Vec<ChatMessage> = history[skip..].to_vec();
        messages.push(ChatMessage::user(augment_query(query, hits)));

        ChatRequest {
            system: Some(system),
            messages,
        }
    }
}

fn augment_query(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No passages in the knowledge base matched this question.\n\nQuestion: {query}");
    }
    let mut prompt = String::from("Relevant passages from the knowledge base:\n\n");
    for (i, hit) in hits.iter().enumerate() {
        let source = match &hit.title {
            Some(title) => format!("{title} ({})", hit.url),
            None => hit.url.clone(),
        };
        prompt.push_str(&format!("[{}] {}\n{}\n\n", i + 1, source, hit.content.trim()));
    }
    prompt.push_str(&format!("Question: {query}"));
    prompt
}
