use crate::{AnswerId, Turn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ingest these URLs (already deduplicated) into the knowledge base.
    LoadKnowledgeBase { urls: Vec<String> },
    /// Run the agent; `history` excludes the turn for `query` itself. Every
    /// message reporting on the run carries `id`.
    RunAgent {
        id: AnswerId,
        query: String,
        history: Vec<Turn>,
    },
}
