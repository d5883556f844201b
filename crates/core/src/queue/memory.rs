use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{MessageQueue, QueueError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub id: String,
    pub topic: String,
    pub payload: Vec<u8>,
    pub attributes: HashMap<String, String>,
}

/// Records every published message; ids are sequential.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueue {
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        attributes: HashMap<String, String>,
    ) -> Result<String, QueueError> {
        let mut messages = self.messages.lock().await;
        let id = format!("msg-{}", messages.len() + 1);
        messages.push(PublishedMessage {
            id: id.clone(),
            topic: topic.to_string(),
            payload: payload.to_vec(),
            attributes,
        });
        Ok(id)
    }
}
