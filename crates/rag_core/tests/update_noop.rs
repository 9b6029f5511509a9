use rag_core::{update, AnswerEvent, AnswerId, Msg, SessionContext};

#[test]
fn update_is_noop() {
    let state = SessionContext::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn answer_messages_without_in_flight_answer_are_ignored() {
    let state = SessionContext::new();
    let (next, effects) = update(
        state.clone(),
        Msg::AnswerEvent {
            id: AnswerId::default(),
            event: AnswerEvent::Content("stray".into()),
        },
    );
    assert_eq!(state, next);
    assert!(effects.is_empty());

    let (next, _) = update(
        next,
        Msg::AnswerFinished {
            id: AnswerId::default(),
        },
    );
    assert!(next.memory().is_empty());
}
