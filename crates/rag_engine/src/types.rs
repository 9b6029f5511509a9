use std::fmt;

use uuid::Uuid;

/// Pipeline stage of one URL during a knowledge load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Downloading,
    Converting,
    Chunking,
    Embedding,
    Upserting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadProgress {
    pub url: String,
    pub stage: Stage,
    pub bytes: Option<u64>,
    pub chunks: Option<usize>,
}

impl LoadProgress {
    pub fn stage(url: &str, stage: Stage) -> Self {
        Self {
            url: url.to_string(),
            stage,
            bytes: None,
            chunks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// A fetched page reduced to markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
}

/// One embeddable slice of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub index: usize,
    pub content: String,
}

impl Chunk {
    /// Ids are derived from source URL and position so a reload overwrites
    /// the previous objects instead of adding copies.
    pub fn new(url: &str, title: Option<&str>, index: usize, content: String) -> Self {
        let key = format!("{url}#{index}");
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()),
            url: url.to_string(),
            title: title.map(str::to_string),
            index,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub score: Option<f32>,
}
