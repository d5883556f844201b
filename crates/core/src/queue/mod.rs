//! Publish-only message queue used to kick off external scraper/fetcher jobs.

pub mod memory;
pub mod pubsub;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::credentials::TokenError;

pub use memory::{InMemoryQueue, PublishedMessage};
pub use pubsub::PubSubQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue returned HTTP {status} for topic {topic}: {body}")]
    Publish { topic: String, status: u16, body: String },

    #[error("queue unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("queue returned no message id for topic {0}")]
    MissingMessageId(String),

    #[error("queue credentials: {0}")]
    Token(#[from] TokenError),
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publish `payload` to `topic`; returns the queue-assigned message id.
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        attributes: HashMap<String, String>,
    ) -> Result<String, QueueError>;
}
