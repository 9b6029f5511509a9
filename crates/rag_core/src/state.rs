use serde::Serialize;

use crate::intake::can_add_entry;
use crate::view_model::AppViewModel;
use crate::{AnswerAggregator, AnswerId, ConversationMemory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

/// Feedback shown to the user after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
}

impl Notice {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

/// What the session knows about the knowledge base it loaded. The engine keeps
/// the live client; the session only keeps this summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeRef {
    pub collection: String,
    pub documents: usize,
    pub chunks: usize,
}

/// Per-user session state. Created when a browser session starts, mutated only
/// through [`crate::update`], dropped when the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    url_entries: Vec<String>,
    docs_loaded: bool,
    loaded_urls: Option<Vec<String>>,
    knowledge: Option<KnowledgeRef>,
    memory: ConversationMemory,
    answer: Option<AnswerAggregator>,
    /// Last id handed out; the in-flight answer, if any, owns it.
    last_answer: AnswerId,
    load_in_progress: bool,
    notice: Option<Notice>,
    dirty: bool,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            url_entries: vec![String::new()],
            docs_loaded: false,
            loaded_urls: None,
            knowledge: None,
            memory: ConversationMemory::new(),
            answer: None,
            last_answer: AnswerId::default(),
            load_in_progress: false,
            notice: None,
            dirty: false,
        }
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let loaded_urls = if self.docs_loaded {
            self.loaded_urls.clone().unwrap_or_default()
        } else {
            Vec::new()
        };
        AppViewModel {
            url_entries: self.url_entries.clone(),
            can_add_url: can_add_entry(&self.url_entries),
            docs_loaded: self.docs_loaded,
            loaded_urls,
            knowledge: self.knowledge.clone(),
            load_in_progress: self.load_in_progress,
            turns: self.memory.turns().to_vec(),
            streaming_answer: self.answer.as_ref().map(|a| a.current().to_string()),
            answer_id: self.answer_id(),
            notice: self.notice.clone(),
            dirty: self.dirty,
        }
    }

    pub fn url_entries(&self) -> &[String] {
        &self.url_entries
    }

    pub fn docs_loaded(&self) -> bool {
        self.docs_loaded
    }

    pub fn knowledge(&self) -> Option<&KnowledgeRef> {
        self.knowledge.as_ref()
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_answering(&self) -> bool {
        self.answer.is_some()
    }

    pub fn answer_id(&self) -> Option<AnswerId> {
        self.answer.as_ref().map(|_| self.last_answer)
    }

    /// Accumulated text of the in-flight answer, if any.
    pub fn streaming_answer(&self) -> Option<&str> {
        self.answer.as_ref().map(AnswerAggregator::current)
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_notice(&mut self, severity: Severity, text: impl Into<String>) {
        self.notice = Some(Notice::new(severity, text));
        self.mark_dirty();
    }

    pub(crate) fn clear_notice(&mut self) {
        if self.notice.take().is_some() {
            self.mark_dirty();
        }
    }

    pub(crate) fn edit_url(&mut self, index: usize, text: String) -> bool {
        match self.url_entries.get_mut(index) {
            Some(entry) if *entry != text => {
                *entry = text;
                self.mark_dirty();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn add_url_entry(&mut self) -> bool {
        if !can_add_entry(&self.url_entries) {
            return false;
        }
        self.url_entries.push(String::new());
        self.mark_dirty();
        true
    }

    pub(crate) fn load_in_progress(&self) -> bool {
        self.load_in_progress
    }

    pub(crate) fn begin_load(&mut self) {
        self.load_in_progress = true;
        self.mark_dirty();
    }

    pub(crate) fn end_load(&mut self) {
        self.load_in_progress = false;
        self.mark_dirty();
    }

    pub(crate) fn apply_loaded(&mut self, urls: Vec<String>, knowledge: KnowledgeRef) {
        self.docs_loaded = true;
        self.loaded_urls = Some(urls);
        self.knowledge = Some(knowledge);
        self.mark_dirty();
    }

    /// Clears the loaded flag, the URL snapshot and conversation memory. The
    /// knowledge reference survives; queries stay blocked until the next load
    /// sets the flag again.
    pub(crate) fn reset(&mut self) {
        self.docs_loaded = false;
        self.loaded_urls = None;
        self.memory.clear();
        self.answer = None;
        self.mark_dirty();
    }

    pub(crate) fn memory_mut(&mut self) -> &mut ConversationMemory {
        self.mark_dirty();
        &mut self.memory
    }

    pub(crate) fn start_answer(&mut self) -> AnswerId {
        self.last_answer = self.last_answer.next();
        self.answer = Some(AnswerAggregator::new());
        self.mark_dirty();
        self.last_answer
    }

    /// The in-flight aggregator, provided `id` still owns it.
    pub(crate) fn answer_mut(&mut self, id: AnswerId) -> Option<&mut AnswerAggregator> {
        if id != self.last_answer {
            return None;
        }
        self.answer.as_mut()
    }

    pub(crate) fn take_answer(&mut self, id: AnswerId) -> Option<AnswerAggregator> {
        if id != self.last_answer {
            return None;
        }
        let answer = self.answer.take();
        if answer.is_some() {
            self.mark_dirty();
        }
        answer
    }
}
