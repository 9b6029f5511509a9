use crate::{AnswerEvent, AnswerId, KnowledgeRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the URL field at `index`.
    UrlEdited { index: usize, text: String },
    /// User clicked the add-URL control.
    AddUrlClicked,
    /// User clicked "Load Knowledge Base".
    LoadClicked,
    /// Knowledge loader finished successfully.
    LoadSucceeded {
        urls: Vec<String>,
        knowledge: KnowledgeRef,
    },
    /// Knowledge loader failed.
    LoadFailed { message: String },
    /// User clicked "Reset KB".
    ResetClicked,
    /// User submitted a chat query.
    QuerySubmitted(String),
    /// Agent streaming progress for answer `id`.
    AnswerEvent { id: AnswerId, event: AnswerEvent },
    /// Agent stream for answer `id` ended.
    AnswerFinished { id: AnswerId },
    /// Consumer went away before the stream ended.
    AnswerCancelled { id: AnswerId },
    /// Agent could not start or failed mid-stream.
    AnswerFailed { id: AnswerId, message: String },
    /// Fallback for placeholder wiring.
    NoOp,
}
