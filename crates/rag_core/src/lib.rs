//! URL RAG core: pure session state machine, URL intake and answer streaming.
mod effect;
mod intake;
mod memory;
mod msg;
mod state;
mod stream;
mod update;
mod view_model;

pub use effect::Effect;
pub use intake::{can_add_entry, dedupe_urls};
pub use memory::{ConversationMemory, Role, Turn};
pub use msg::Msg;
pub use state::{KnowledgeRef, Notice, SessionContext, Severity};
pub use stream::{
    consume_answer, AnswerAggregator, AnswerEvent, AnswerId, DisplaySink, StreamError,
};
pub use update::{
    update, ANSWER_BUSY_WARNING, LOAD_BUSY_INFO, LOAD_FIRST_WARNING, NO_URLS_WARNING,
    RESET_SUCCESS,
};
pub use view_model::AppViewModel;
