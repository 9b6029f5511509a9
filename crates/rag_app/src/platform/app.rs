use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, BoxStream, StreamExt};
use rag_core::{AnswerId, AppViewModel, DisplaySink, Msg};
use rag_engine::{Engine, RunStream};
use rag_logging::{rag_debug, rag_error, rag_info, rag_warn};
use serde::Deserialize;

use super::effects::{answer_error_message, map_event, EffectRunner};
use super::error::ApiError;
use super::session::{SessionId, SessionStore};
use super::ui::constants::{EVENT_ANSWER, EVENT_DONE, EVENT_NOTICE};
use super::ui::{layout, render};
use crate::config::AppConfig;

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

#[derive(Clone)]
pub struct ServerState {
    sessions: SessionStore,
    runner: Arc<EffectRunner>,
}

impl ServerState {
    pub fn new(engine: Engine) -> Self {
        let sessions = SessionStore::new();
        let runner = Arc::new(EffectRunner::new(Arc::new(engine), sessions.clone()));
        Self { sessions, runner }
    }
}

#[derive(Deserialize)]
struct UrlForm {
    value: String,
}

#[derive(Deserialize)]
struct AskParams {
    #[serde(default)]
    query: String,
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let state = ServerState::new(Engine::new(config.engine));
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    rag_info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(new_session))
        .route("/sessions/:id", get(page).delete(end_session))
        .route("/sessions/:id/view", get(view))
        .route("/sessions/:id/urls", post(add_url))
        .route("/sessions/:id/urls/:index", post(edit_url))
        .route("/sessions/:id/load", post(load))
        .route("/sessions/:id/reset", post(reset))
        .route("/sessions/:id/ask", get(ask))
        .with_state(state)
}

async fn new_session(State(state): State<ServerState>) -> Redirect {
    let id = state.sessions.create();
    Redirect::to(&format!("/sessions/{id}"))
}

async fn page(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> Result<Html<String>, ApiError> {
    let view = state.sessions.view(id)?;
    Ok(Html(layout::page(id, render::app_fragment(&view)?)?))
}

async fn view(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> Result<Json<AppViewModel>, ApiError> {
    Ok(Json(state.sessions.view(id)?))
}

async fn edit_url(
    State(state): State<ServerState>,
    Path((id, index)): Path<(SessionId, usize)>,
    Form(form): Form<UrlForm>,
) -> Result<Html<String>, ApiError> {
    apply(&state, id, Msg::UrlEdited {
        index,
        text: form.value,
    })
    .await
}

async fn add_url(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> Result<Html<String>, ApiError> {
    apply(&state, id, Msg::AddUrlClicked).await
}

async fn load(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> Result<Html<String>, ApiError> {
    apply(&state, id, Msg::LoadClicked).await
}

async fn reset(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> Result<Html<String>, ApiError> {
    apply(&state, id, Msg::ResetClicked).await
}

async fn end_session(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Dispatches `msg`, runs its effects to completion and renders the result.
async fn apply(state: &ServerState, id: SessionId, msg: Msg) -> Result<Html<String>, ApiError> {
    let dispatched = state.sessions.dispatch(id, msg)?;
    if !dispatched.effects.is_empty() {
        state.runner.execute(id, dispatched.effects).await;
    }
    let view = state.sessions.view(id)?;
    Ok(Html(render::app_fragment(&view)?))
}

async fn ask(
    State(state): State<ServerState>,
    Path(id): Path<SessionId>,
    Query(params): Query<AskParams>,
) -> Result<Sse<EventStream>, ApiError> {
    let dispatched = state.sessions.dispatch(id, Msg::QuerySubmitted(params.query))?;
    let events = match state.runner.execute(id, dispatched.effects).await {
        Some((answer, run)) => relay_answer(state.sessions.clone(), id, answer, run),
        None => {
            let view = state.sessions.view(id)?;
            let name = if view.notice.is_some() {
                EVENT_NOTICE
            } else {
                EVENT_DONE
            };
            stream::once(async move { Ok(fragment_event(name, &view)) }).boxed()
        }
    };
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Display sink that turns each growth of the answer into an SSE event.
#[derive(Default)]
struct SseDisplay {
    pending: Option<Event>,
}

impl SseDisplay {
    fn take(&mut self) -> Option<Event> {
        self.pending.take()
    }
}

impl DisplaySink for SseDisplay {
    fn show(&mut self, answer: &str) {
        self.pending = Some(Event::default().event(EVENT_ANSWER).data(sse_data(answer)));
    }
}

/// Owns the agent stream for one answer. Dropping it before the stream ends
/// (the client went away) cancels the answer in the session.
struct AnswerRelay {
    sessions: SessionStore,
    id: SessionId,
    answer: AnswerId,
    run: RunStream,
    display: SseDisplay,
    open: bool,
}

impl AnswerRelay {
    fn close(&mut self, msg: Msg) -> Option<AppViewModel> {
        self.open = false;
        self.sessions.dispatch(self.id, msg).ok().map(|d| d.view)
    }
}

impl Drop for AnswerRelay {
    fn drop(&mut self) {
        if self.open {
            rag_info!("answer stream for session {} dropped by client", self.id);
            let cancelled = Msg::AnswerCancelled { id: self.answer };
            if let Err(err) = self.sessions.dispatch(self.id, cancelled) {
                rag_debug!("cancel of answer {} not delivered: {}", self.answer, err);
            }
        }
    }
}

fn relay_answer(sessions: SessionStore, id: SessionId, answer: AnswerId, run: RunStream) -> EventStream {
    let relay = AnswerRelay {
        sessions,
        id,
        answer,
        run,
        display: SseDisplay::default(),
        open: true,
    };
    stream::unfold(Some(relay), |relay| async move {
        let mut relay = relay?;
        loop {
            match relay.run.next().await {
                Some(Ok(event)) => {
                    let event = map_event(event);
                    let has_text = event.content().is_some();
                    let msg = Msg::AnswerEvent {
                        id: relay.answer,
                        event,
                    };
                    let Ok(dispatched) = relay.sessions.dispatch(relay.id, msg) else {
                        relay.open = false;
                        return None;
                    };
                    let view = dispatched.view;
                    if view.answer_id != Some(relay.answer) {
                        rag_info!(
                            "answer {} for session {} was superseded",
                            relay.answer,
                            relay.id
                        );
                        relay.open = false;
                        return Some((Ok(fragment_event(EVENT_DONE, &view)), None));
                    }
                    if let Some(current) = view.streaming_answer.filter(|_| has_text) {
                        relay.display.show(&current);
                    }
                    if let Some(event) = relay.display.take() {
                        return Some((Ok(event), Some(relay)));
                    }
                }
                Some(Err(err)) => {
                    rag_warn!("answer stream for session {} failed: {}", relay.id, err);
                    let view = relay.close(Msg::AnswerFailed {
                        id: relay.answer,
                        message: answer_error_message(&err),
                    })?;
                    return Some((Ok(fragment_event(EVENT_NOTICE, &view)), None));
                }
                None => {
                    let view = relay.close(Msg::AnswerFinished { id: relay.answer })?;
                    return Some((Ok(fragment_event(EVENT_DONE, &view)), None));
                }
            }
        }
    })
    .boxed()
}

fn fragment_event(name: &'static str, view: &AppViewModel) -> Event {
    let html = render::app_fragment(view).unwrap_or_else(|err| {
        rag_error!("failed to render fragment: {}", err);
        String::new()
    });
    Event::default().event(name).data(sse_data(&html))
}

// SSE fields may not carry carriage returns; newlines are split by `data`.
fn sse_data(text: &str) -> String {
    text.replace('\r', "")
}
