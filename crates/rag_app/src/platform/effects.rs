use std::sync::Arc;

use rag_core::{AnswerEvent, AnswerId, Effect, KnowledgeRef, Msg, Role, Turn};
use rag_engine::{
    AgentError, ChatMessage, Engine, LoadReport, LogProgressSink, RunEvent, RunStream,
};
use rag_logging::{rag_debug, rag_info, rag_warn};

use super::session::{SessionId, SessionStore};

/// Executes core effects against the engine and feeds completions back into
/// the session as messages.
pub struct EffectRunner {
    engine: Arc<Engine>,
    sessions: SessionStore,
}

impl EffectRunner {
    pub fn new(engine: Arc<Engine>, sessions: SessionStore) -> Self {
        Self { engine, sessions }
    }

    /// Runs `effects` in order. A started agent run is handed back to the
    /// caller to stream, tagged with its answer id; everything else completes
    /// before returning.
    pub async fn execute(&self, id: SessionId, effects: Vec<Effect>) -> Option<(AnswerId, RunStream)> {
        let mut run = None;
        for effect in effects {
            match effect {
                Effect::LoadKnowledgeBase { urls } => {
                    rag_info!("LoadKnowledgeBase session={} urls={}", id, urls.len());
                    self.load(id, urls).await;
                }
                Effect::RunAgent {
                    id: answer,
                    query,
                    history,
                } => {
                    rag_info!(
                        "RunAgent session={} answer={} query_len={} history={}",
                        id,
                        answer,
                        query.len(),
                        history.len()
                    );
                    run = self
                        .start_run(id, answer, &query, &history)
                        .await
                        .map(|stream| (answer, stream));
                }
            }
        }
        run
    }

    async fn load(&self, id: SessionId, urls: Vec<String>) {
        let msg = match self.engine.load_knowledge(&urls, &LogProgressSink).await {
            Ok((knowledge, report)) => {
                if let Err(err) = self.sessions.set_knowledge(id, knowledge) {
                    rag_debug!("discarding loaded knowledge: {}", err);
                    return;
                }
                Msg::LoadSucceeded {
                    knowledge: map_report(&report),
                    urls: report.urls,
                }
            }
            Err(err) => {
                rag_warn!("load failed for session {}: {}", id, err);
                Msg::LoadFailed {
                    message: err.to_string(),
                }
            }
        };
        self.report(id, msg);
    }

    async fn start_run(
        &self,
        id: SessionId,
        answer: AnswerId,
        query: &str,
        history: &[Turn],
    ) -> Option<RunStream> {
        let knowledge = match self.sessions.knowledge(id) {
            Ok(knowledge) => knowledge,
            Err(err) => {
                rag_debug!("skipping agent run: {}", err);
                return None;
            }
        };
        match self.engine.ask(query, &map_history(history), knowledge).await {
            Ok(run) => Some(run),
            Err(err) => {
                rag_warn!("agent run failed to start for session {}: {}", id, err);
                self.report(
                    id,
                    Msg::AnswerFailed {
                        id: answer,
                        message: answer_error_message(&err),
                    },
                );
                None
            }
        }
    }

    /// Feeds a completion back into the session. The session may have ended
    /// while the effect ran.
    fn report(&self, id: SessionId, msg: Msg) {
        if let Err(err) = self.sessions.dispatch(id, msg) {
            rag_debug!("dropping completion: {}", err);
        }
    }
}

pub fn answer_error_message(err: &AgentError) -> String {
    match err {
        AgentError::KnowledgeBaseUnset => err.to_string(),
        _ => format!("Error answering query: {err}"),
    }
}

pub fn map_event(event: RunEvent) -> AnswerEvent {
    match event {
        RunEvent::RunStarted => AnswerEvent::Started,
        RunEvent::KnowledgeSearched { hits } => AnswerEvent::Retrieved { hits: hits.len() },
        RunEvent::Content { text } => AnswerEvent::Content(text),
        RunEvent::RunCompleted => AnswerEvent::Completed,
    }
}

fn map_history(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|turn| match turn.role {
            Role::User => ChatMessage::user(turn.content.clone()),
            Role::Assistant => ChatMessage::model(turn.content.clone()),
        })
        .collect()
}

fn map_report(report: &LoadReport) -> KnowledgeRef {
    KnowledgeRef {
        collection: report.collection.clone(),
        documents: report.documents,
        chunks: report.chunks,
    }
}
