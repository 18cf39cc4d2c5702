//! The content platform seen by the harvester.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::harvest::model::Thread;

pub type Result<T> = std::result::Result<T, SourceError>;

/// Failures a content source can report. The harvester treats all of them as
/// per-thread and non-fatal; only `RateLimited` changes its pacing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("client error (status {status}): {message}")]
    Client { status: u16, message: String },

    #[error("platform error: {0}")]
    Platform(String),

    #[error("rate limited")]
    RateLimited {
        /// Server-suggested wait, when it sent one.
        retry_after: Option<Duration>,
    },
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Platform(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Platform(format!("unexpected response shape: {err}"))
    }
}

/// A platform that ranks threads and can hand over their full reply trees.
pub trait ContentSource {
    /// Up to `limit` ranked threads for `topic`, comments not yet loaded.
    fn list_threads(&self, topic: &str, limit: usize) -> impl Future<Output = Result<Vec<Thread>>> + Send;

    /// Load every reply under `thread` into `thread.comments`, resolving any
    /// placeholders the platform uses to truncate deep or wide trees.
    fn expand_all_replies(&self, thread: &mut Thread) -> impl Future<Output = Result<()>> + Send;
}
