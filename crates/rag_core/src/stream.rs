use std::fmt;

use serde::Serialize;

/// Identifies one submitted query within a session. Messages about an answer
/// that is no longer in flight carry a stale id and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct AnswerId(u64);

impl AnswerId {
    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for AnswerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress of one agent run, as seen by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEvent {
    /// The agent accepted the query.
    Started,
    /// Knowledge search finished with this many passages.
    Retrieved { hits: usize },
    /// A text fragment of the answer.
    Content(String),
    /// The model finished generating.
    Completed,
}

impl AnswerEvent {
    /// Text payload if this is a content-bearing event.
    pub fn content(&self) -> Option<&str> {
        match self {
            AnswerEvent::Content(text) => Some(text),
            _ => None,
        }
    }
}

/// Receives the accumulated answer each time it grows.
pub trait DisplaySink {
    fn show(&mut self, answer: &str);
}

impl<F: FnMut(&str)> DisplaySink for F {
    fn show(&mut self, answer: &str) {
        self(answer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("agent produced no events")]
    NoEvents,
}

/// Concatenates streamed fragments in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerAggregator {
    answer: String,
    events_seen: usize,
}

impl AnswerAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one event. Returns the accumulated answer when the event
    /// carried text, `None` otherwise.
    pub fn push(&mut self, event: &AnswerEvent) -> Option<&str> {
        self.events_seen += 1;
        let text = event.content()?;
        self.answer.push_str(text);
        Some(&self.answer)
    }

    pub fn current(&self) -> &str {
        &self.answer
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    /// Finalizes after the stream ended normally. Blank answers come back as
    /// `None`.
    pub fn finish(self) -> Option<String> {
        non_blank(self.answer)
    }

    /// Finalizes after an explicit cancellation; whatever arrived so far is kept.
    pub fn cancel(self) -> Option<String> {
        non_blank(self.answer)
    }
}

fn non_blank(answer: String) -> Option<String> {
    if answer.trim().is_empty() {
        None
    } else {
        Some(answer)
    }
}

/// Drives a complete event sequence through an aggregator, pushing every
/// growth of the answer to `sink`.
///
/// Returns the finished answer (`None` when no text arrived), or
/// [`StreamError::NoEvents`] if the sequence was empty.
pub fn consume_answer<I>(events: I, sink: &mut dyn DisplaySink) -> Result<Option<String>, StreamError>
where
    I: IntoIterator<Item = AnswerEvent>,
{
    let mut aggregator = AnswerAggregator::new();
    for event in events {
        if let Some(current) = aggregator.push(&event) {
            sink.show(current);
        }
    }
    if aggregator.events_seen() == 0 {
        return Err(StreamError::NoEvents);
    }
    Ok(aggregator.finish())
}
