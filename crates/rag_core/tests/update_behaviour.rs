use std::sync::Once;

use pretty_assertions::assert_eq;
use rag_core::{
    update, AnswerEvent, AnswerId, Effect, KnowledgeRef, Msg, Role, SessionContext, Severity, Turn,
    LOAD_FIRST_WARNING, NO_URLS_WARNING, RESET_SUCCESS,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(rag_logging::initialize_for_tests);
}

fn knowledge(documents: usize) -> KnowledgeRef {
    KnowledgeRef {
        collection: "AgenticRag".to_string(),
        documents,
        chunks: documents * 2,
    }
}

fn enter_urls(mut state: SessionContext, urls: &[&str]) -> SessionContext {
    for (index, url) in urls.iter().enumerate() {
        if index > 0 {
            state = update(state, Msg::AddUrlClicked).0;
        }
        state = update(
            state,
            Msg::UrlEdited {
                index,
                text: url.to_string(),
            },
        )
        .0;
    }
    state
}

fn loaded_session(urls: &[&str]) -> SessionContext {
    load(enter_urls(SessionContext::new(), urls))
}

fn load(state: SessionContext) -> SessionContext {
    let (state, effects) = update(state, Msg::LoadClicked);
    let Some(Effect::LoadKnowledgeBase { urls }) = effects.into_iter().next() else {
        panic!("expected load effect");
    };
    let count = urls.len();
    update(
        state,
        Msg::LoadSucceeded {
            urls,
            knowledge: knowledge(count),
        },
    )
    .0
}

fn submit(state: SessionContext, query: &str) -> (SessionContext, AnswerId) {
    let (state, effects) = update(state, Msg::QuerySubmitted(query.into()));
    let Some(Effect::RunAgent { id, .. }) = effects.first() else {
        panic!("expected agent run");
    };
    let id = *id;
    (state, id)
}

fn content(id: AnswerId, text: &str) -> Msg {
    Msg::AnswerEvent {
        id,
        event: AnswerEvent::Content(text.into()),
    }
}

#[test]
fn new_session_starts_with_one_blank_field() {
    let view = SessionContext::new().view();
    assert_eq!(view.url_entries, vec![String::new()]);
    assert!(!view.can_add_url);
    assert!(!view.docs_loaded);
    assert!(view.notice.is_none());
}

#[test]
fn add_only_after_last_field_has_content() {
    init_logging();
    let state = SessionContext::new();
    let (state, _) = update(state, Msg::AddUrlClicked);
    assert_eq!(state.url_entries().len(), 1);

    let (state, _) = update(
        state,
        Msg::UrlEdited {
            index: 0,
            text: "https://a.example".into(),
        },
    );
    let (state, _) = update(state, Msg::AddUrlClicked);
    assert_eq!(state.url_entries(), ["https://a.example", ""]);
}

#[test]
fn edit_out_of_range_is_ignored() {
    let state = SessionContext::new();
    let (mut next, effects) = update(
        state,
        Msg::UrlEdited {
            index: 4,
            text: "https://a.example".into(),
        },
    );
    assert_eq!(next.url_entries(), [""]);
    assert!(effects.is_empty());
    assert!(!next.consume_dirty());
}

#[test]
fn load_with_no_urls_warns_without_effect() {
    init_logging();
    let state = enter_urls(SessionContext::new(), &["  "]);
    let (state, effects) = update(state, Msg::LoadClicked);

    assert!(effects.is_empty());
    let view = state.view();
    assert!(!view.load_in_progress);
    assert!(!view.docs_loaded);
    let notice = view.notice.expect("warning");
    assert_eq!(notice.severity, Severity::Warning);
    assert_eq!(notice.text, NO_URLS_WARNING);
}

#[test]
fn load_emits_deduplicated_urls() {
    init_logging();
    let state = enter_urls(
        SessionContext::new(),
        &["https://a.example", "https://b.example", "https://a.example"],
    );
    let (state, effects) = update(state, Msg::LoadClicked);

    assert_eq!(
        effects,
        vec![Effect::LoadKnowledgeBase {
            urls: vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ],
        }]
    );
    assert!(state.view().load_in_progress);

    let (_, effects) = update(state, Msg::LoadClicked);
    assert!(effects.is_empty(), "second load while busy must not start");
}

#[test]
fn load_success_snapshots_urls() {
    init_logging();
    let state = loaded_session(&["https://a.example", "https://b.example"]);
    let view = state.view();

    assert!(view.docs_loaded);
    assert!(!view.load_in_progress);
    assert_eq!(view.loaded_urls, vec!["https://a.example", "https://b.example"]);
    assert_eq!(view.knowledge, Some(knowledge(2)));
    let notice = view.notice.unwrap();
    assert_eq!(notice.severity, Severity::Success);
    assert_eq!(notice.text, "Knowledge base loaded with 2 URL(s)!");

    // Editing fields afterwards does not touch the snapshot.
    let (state, _) = update(
        state,
        Msg::UrlEdited {
            index: 0,
            text: "https://changed.example".into(),
        },
    );
    assert_eq!(
        state.view().loaded_urls,
        vec!["https://a.example", "https://b.example"]
    );
}

#[test]
fn load_failure_reports_and_keeps_previous_state() {
    init_logging();
    let state = loaded_session(&["https://a.example"]);
    let before = state.view();

    let (state, _) = update(state, Msg::LoadClicked);
    let (state, effects) = update(
        state,
        Msg::LoadFailed {
            message: "WEAVIATE_URL not set".into(),
        },
    );

    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.loaded_urls, before.loaded_urls);
    assert_eq!(view.knowledge, before.knowledge);
    assert!(view.docs_loaded);
    assert!(!view.load_in_progress);
    let notice = view.notice.unwrap();
    assert_eq!(notice.severity, Severity::Error);
    assert_eq!(notice.text, "Error loading KB: WEAVIATE_URL not set");
}

#[test]
fn query_before_load_warns_without_agent() {
    init_logging();
    let (state, effects) = update(SessionContext::new(), Msg::QuerySubmitted("why?".into()));

    assert!(effects.is_empty());
    assert!(state.memory().is_empty());
    let notice = state.notice().unwrap();
    assert_eq!(notice.severity, Severity::Warning);
    assert_eq!(notice.text, LOAD_FIRST_WARNING);
}

#[test]
fn blank_query_is_ignored() {
    let state = loaded_session(&["https://a.example"]);
    let (state, effects) = update(state, Msg::QuerySubmitted("   ".into()));
    assert!(effects.is_empty());
    assert!(state.memory().is_empty());
}

#[test]
fn query_streams_and_records_turns() {
    init_logging();
    let state = loaded_session(&["https://a.example"]);

    let (state, effects) = update(state, Msg::QuerySubmitted("greet me".into()));
    let Some(Effect::RunAgent { id, .. }) = effects.first() else {
        panic!("expected agent run");
    };
    let id = *id;
    assert_eq!(
        effects,
        vec![Effect::RunAgent {
            id,
            query: "greet me".into(),
            history: Vec::new(),
        }]
    );
    assert!(state.is_answering());
    assert_eq!(state.answer_id(), Some(id));

    let mut state = state;
    let mut displayed = Vec::new();
    for event in [
        AnswerEvent::Started,
        AnswerEvent::Content("Hel".into()),
        AnswerEvent::Content("lo".into()),
        AnswerEvent::Retrieved { hits: 2 },
        AnswerEvent::Content("!".into()),
    ] {
        state = update(state, Msg::AnswerEvent { id, event }).0;
        displayed.push(state.streaming_answer().unwrap().to_string());
    }
    assert_eq!(displayed.last().map(String::as_str), Some("Hello!"));

    let (state, _) = update(state, Msg::AnswerFinished { id });
    assert!(!state.is_answering());
    assert_eq!(state.answer_id(), None);
    assert_eq!(
        state.memory().turns(),
        [
            Turn {
                role: Role::User,
                content: "greet me".into()
            },
            Turn {
                role: Role::Assistant,
                content: "Hello!".into()
            },
        ]
    );

    // The next query carries the previous exchange as history.
    let (_, effects) = update(state, Msg::QuerySubmitted("again".into()));
    let Some(Effect::RunAgent { id: next, history, .. }) = effects.first() else {
        panic!("expected agent run");
    };
    assert_ne!(*next, id);
    assert_eq!(history.len(), 2);
}

#[test]
fn empty_stream_records_no_assistant_turn() {
    let state = loaded_session(&["https://a.example"]);
    let (state, id) = submit(state, "hi");
    let (state, _) = update(state, Msg::AnswerFinished { id });

    assert_eq!(state.memory().len(), 1);
    assert_eq!(state.memory().turns()[0].role, Role::User);
}

#[test]
fn second_query_while_answering_is_rejected() {
    let state = loaded_session(&["https://a.example"]);
    let (state, _) = submit(state, "first");
    let (state, effects) = update(state, Msg::QuerySubmitted("second".into()));

    assert!(effects.is_empty());
    assert_eq!(state.memory().len(), 1);
    assert_eq!(state.notice().unwrap().severity, Severity::Warning);
}

#[test]
fn cancelled_answer_keeps_partial_text() {
    let state = loaded_session(&["https://a.example"]);
    let (state, id) = submit(state, "q");
    let (state, _) = update(state, content(id, "par"));
    let (state, _) = update(state, Msg::AnswerCancelled { id });

    assert_eq!(state.memory().turns()[1].content, "par");
}

#[test]
fn failed_answer_reports_error_and_records_nothing() {
    let state = loaded_session(&["https://a.example"]);
    let (state, id) = submit(state, "q");
    let (state, _) = update(state, content(id, "par"));
    let (state, _) = update(
        state,
        Msg::AnswerFailed {
            id,
            message: "rate limited".into(),
        },
    );

    assert!(!state.is_answering());
    assert_eq!(state.memory().len(), 1);
    assert_eq!(state.notice().unwrap().severity, Severity::Error);
}

#[test]
fn reset_clears_flag_and_memory_but_not_intake() {
    init_logging();
    let state = loaded_session(&["https://a.example", "https://b.example"]);
    let (state, id) = submit(state, "q");
    let (state, _) = update(state, content(id, "a"));
    let (state, _) = update(state, Msg::AnswerFinished { id });
    assert_eq!(state.memory().len(), 2);

    let (state, effects) = update(state, Msg::ResetClicked);
    assert!(effects.is_empty());
    let view = state.view();
    assert!(!view.docs_loaded);
    assert!(view.loaded_urls.is_empty());
    assert!(view.turns.is_empty());
    assert_eq!(view.notice.unwrap().text, RESET_SUCCESS);

    // Queries are blocked again until the next load.
    let (state, effects) = update(state, Msg::QuerySubmitted("q".into()));
    assert!(effects.is_empty());
    assert_eq!(state.notice().unwrap().text, LOAD_FIRST_WARNING);

    // URL entries survive and dedupe the same way on the next load.
    let (_, effects) = update(state, Msg::LoadClicked);
    assert_eq!(
        effects,
        vec![Effect::LoadKnowledgeBase {
            urls: vec!["https://a.example".into(), "https://b.example".into()],
        }]
    );
}

#[test]
fn reset_drops_in_flight_answer() {
    let state = loaded_session(&["https://a.example"]);
    let (state, id) = submit(state, "q");
    let (state, _) = update(state, Msg::ResetClicked);
    assert!(!state.is_answering());

    let (state, _) = update(state, content(id, "late"));
    let (state, _) = update(state, Msg::AnswerFinished { id });
    assert!(state.memory().is_empty());
}

#[test]
fn superseded_answer_cannot_touch_the_current_one() {
    init_logging();
    let state = loaded_session(&["https://a.example"]);
    let (state, stale) = submit(state, "q1");
    let (state, _) = update(state, Msg::ResetClicked);
    let state = load(state);
    let (state, current) = submit(state, "q2");
    assert_ne!(stale, current);

    let (state, _) = update(state, content(stale, "STALE answer to q1"));
    let (state, _) = update(state, Msg::AnswerFinished { id: stale });
    assert_eq!(state.answer_id(), Some(current));
    assert_eq!(state.streaming_answer(), Some(""));

    let (state, _) = update(
        state,
        Msg::AnswerFailed {
            id: stale,
            message: "late failure".into(),
        },
    );
    assert!(state.is_answering());
    assert_ne!(state.notice().map(|n| n.severity), Some(Severity::Error));

    let (state, _) = update(state, content(current, "fresh answer to q2"));
    let (mut state, _) = update(state, Msg::AnswerFinished { id: current });
    assert_eq!(
        state.memory().turns(),
        [
            Turn {
                role: Role::User,
                content: "q2".into()
            },
            Turn {
                role: Role::Assistant,
                content: "fresh answer to q2".into()
            },
        ]
    );

    // Late messages from the old run leave no trace.
    state.consume_dirty();
    let (mut state, _) = update(state, Msg::AnswerCancelled { id: stale });
    assert!(!state.consume_dirty());
}

#[test]
fn user_action_clears_previous_notice() {
    let (state, _) = update(SessionContext::new(), Msg::LoadClicked);
    assert!(state.notice().is_some());
    let (state, _) = update(
        state,
        Msg::UrlEdited {
            index: 0,
            text: "https://a.example".into(),
        },
    );
    assert!(state.notice().is_none());
}
