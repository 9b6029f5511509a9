pub const PAGE_TITLE: &str = "URL RAG (Gemini + Weaviate)";
pub const HEADING: &str = "Agentic URL RAG (Gemini + Weaviate)";

// SSE event names on the answer stream.
pub const EVENT_ANSWER: &str = "answer";
pub const EVENT_DONE: &str = "done";
pub const EVENT_NOTICE: &str = "notice";
