use crate::intake::dedupe_urls;
use crate::{Effect, Msg, Role, SessionContext, Severity};

pub const NO_URLS_WARNING: &str = "Please add at least one URL.";
pub const LOAD_FIRST_WARNING: &str = "Load the knowledge base first.";
pub const LOAD_BUSY_INFO: &str = "Knowledge base is still loading.";
pub const ANSWER_BUSY_WARNING: &str = "Still answering the previous question.";
pub const RESET_SUCCESS: &str = "Memory reset!";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SessionContext, msg: Msg) -> (SessionContext, Vec<Effect>) {
    let effects = match msg {
        Msg::UrlEdited { index, text } => {
            state.clear_notice();
            state.edit_url(index, text);
            Vec::new()
        }
        Msg::AddUrlClicked => {
            state.clear_notice();
            state.add_url_entry();
            Vec::new()
        }
        Msg::LoadClicked => {
            state.clear_notice();
            let urls = dedupe_urls(state.url_entries());
            if urls.is_empty() {
                state.set_notice(Severity::Warning, NO_URLS_WARNING);
                Vec::new()
            } else if state.load_in_progress() {
                state.set_notice(Severity::Info, LOAD_BUSY_INFO);
                Vec::new()
            } else {
                state.begin_load();
                vec![Effect::LoadKnowledgeBase { urls }]
            }
        }
        Msg::LoadSucceeded { urls, knowledge } => {
            let count = urls.len();
            state.end_load();
            state.apply_loaded(urls, knowledge);
            state.set_notice(
                Severity::Success,
                format!("Knowledge base loaded with {count} URL(s)!"),
            );
            Vec::new()
        }
        Msg::LoadFailed { message } => {
            state.end_load();
            state.set_notice(Severity::Error, format!("Error loading KB: {message}"));
            Vec::new()
        }
        Msg::ResetClicked => {
            state.clear_notice();
            state.reset();
            state.set_notice(Severity::Success, RESET_SUCCESS);
            Vec::new()
        }
        Msg::QuerySubmitted(query) => submit_query(&mut state, query),
        Msg::AnswerEvent { id, event } => {
            if let Some(answer) = state.answer_mut(id) {
                if answer.push(&event).is_some() {
                    state.mark_dirty();
                }
            }
            Vec::new()
        }
        Msg::AnswerFinished { id } => {
            if let Some(answer) = state.take_answer(id).and_then(|a| a.finish()) {
                state.memory_mut().add_message(Role::Assistant, answer);
            }
            Vec::new()
        }
        Msg::AnswerCancelled { id } => {
            if let Some(answer) = state.take_answer(id).and_then(|a| a.cancel()) {
                state.memory_mut().add_message(Role::Assistant, answer);
            }
            Vec::new()
        }
        Msg::AnswerFailed { id, message } => {
            // A superseded run has nothing left to report on.
            if state.take_answer(id).is_some() {
                state.set_notice(Severity::Error, message);
            }
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn submit_query(state: &mut SessionContext, query: String) -> Vec<Effect> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    state.clear_notice();
    if !state.docs_loaded() {
        state.set_notice(Severity::Warning, LOAD_FIRST_WARNING);
        return Vec::new();
    }
    if state.is_answering() {
        state.set_notice(Severity::Warning, ANSWER_BUSY_WARNING);
        return Vec::new();
    }

    let history = state.memory().turns().to_vec();
    state.memory_mut().add_message(Role::User, query.clone());
    let id = state.start_answer();
    vec![Effect::RunAgent { id, query, history }]
}
