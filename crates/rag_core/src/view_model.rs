use serde::Serialize;

use crate::{AnswerId, KnowledgeRef, Notice, Turn};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AppViewModel {
    pub url_entries: Vec<String>,
    pub can_add_url: bool,
    pub docs_loaded: bool,
    /// Only populated while a knowledge base is loaded.
    pub loaded_urls: Vec<String>,
    pub knowledge: Option<KnowledgeRef>,
    pub load_in_progress: bool,
    pub turns: Vec<Turn>,
    pub streaming_answer: Option<String>,
    /// Id of the in-flight answer, if any.
    pub answer_id: Option<AnswerId>,
    pub notice: Option<Notice>,
    pub dirty: bool,
}
