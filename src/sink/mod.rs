// src/sink/mod.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod dry_run;
pub mod kafka;

pub use dry_run::DryRunSink;
pub use kafka::KafkaSink;

#[derive(Debug, Error)]
pub enum PublishError {
    /// The broker could not be reached or the connection broke mid-request.
    #[error("sink unavailable: {0}")]
    SinkUnavailable(String),

    /// The broker answered but refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Anything that can accept one encoded message at a time.
///
/// Implementations are shared across concurrently running publish tasks and
/// must tolerate parallel callers.
#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish(
        &self,
        key: Option<Vec<u8>>,
        payload: Vec<u8>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), PublishError>;
}
