use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{MessageQueue, QueueError};
use crate::credentials::TokenProvider;

pub const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: [OutgoingMessage; 1],
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    data: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(rename = "messageIds", default)]
    message_ids: Vec<String>,
}

/// Google Pub/Sub REST publisher for one project.
#[derive(Clone)]
pub struct PubSubQueue {
    http: Client,
    endpoint: String,
    project: String,
    auth: TokenProvider,
}

impl PubSubQueue {
    pub fn new(project: impl Into<String>, auth: TokenProvider) -> Self {
        Self::with_endpoint(DEFAULT_PUBSUB_ENDPOINT, project, auth)
    }

    pub fn with_endpoint(endpoint: &str, project: impl Into<String>, auth: TokenProvider) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project: project.into(),
            auth,
        }
    }

    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    fn publish_url(&self, topic: &str) -> String {
        format!(
            "{}/v1/projects/{}/topics/{}:publish",
            self.endpoint, self.project, topic
        )
    }
}

#[async_trait]
impl MessageQueue for PubSubQueue {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        attributes: HashMap<String, String>,
    ) -> Result<String, QueueError> {
        let body = PublishRequest {
            messages: [OutgoingMessage {
                data: STANDARD.encode(payload),
                attributes,
            }],
        };

        let request = self.http.post(self.publish_url(topic)).json(&body);
        let response = self.auth.authorize(request).await?.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::Publish {
                topic: topic.to_string(),
                status,
                body,
            });
        }

        let parsed: PublishResponse = response.json().await?;
        let id = parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| QueueError::MissingMessageId(topic.to_string()))?;
        info!(topic, message_id = id.as_str(), "Published job trigger");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::testing::{client, serve};
    use crate::credentials::AccessToken;

    #[test]
    fn publish_url_shape() {
        let queue = PubSubQueue::with_endpoint(
            "http://localhost:8085/",
            "proj",
            TokenProvider::new(AccessToken::Anonymous),
        );
        assert_eq!(
            queue.publish_url("scraper-requests"),
            "http://localhost:8085/v1/projects/proj/topics/scraper-requests:publish"
        );
    }

    #[test]
    fn request_body_is_base64_encoded() {
        let attributes = HashMap::from([("triggered_by".to_string(), "a@b.c".to_string())]);
        let body = PublishRequest {
            messages: [OutgoingMessage {
                data: STANDARD.encode(b"{\"x\":1}"),
                attributes,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["data"], "eyJ4IjoxfQ==");
        assert_eq!(json["messages"][0]["attributes"]["triggered_by"], "a@b.c");
    }

    #[tokio::test]
    async fn unconfigured_token_is_fetched_from_metadata_server() {
        let (metadata, metadata_server) = serve(vec![(
            200,
            r#"{"access_token":"ya29.meta","expires_in":3600}"#.into(),
        )])
        .await;
        let (pubsub, pubsub_server) = serve(vec![(200, r#"{"messageIds":["m-1"]}"#.into())]).await;

        let auth = TokenProvider::new(AccessToken::from_config(None))
            .with_client(client())
            .with_metadata_url(format!("{metadata}/token"));
        let queue = PubSubQueue::with_endpoint(&pubsub, "proj", auth).with_client(client());

        let id = queue
            .publish("scraper-requests", b"{}", HashMap::new())
            .await
            .unwrap();
        assert_eq!(id, "m-1");

        assert_eq!(metadata_server.await.unwrap().len(), 1);
        let published = pubsub_server.await.unwrap();
        assert!(published[0].starts_with("POST /v1/projects/proj/topics/scraper-requests:publish "));
        assert!(published[0].to_ascii_lowercase().contains("authorization: bearer ya29.meta"));
    }

    #[tokio::test]
    async fn rejected_publish_reports_status() {
        let (pubsub, _server) = serve(vec![(403, r#"{"error":"denied"}"#.into())]).await;
        let queue = PubSubQueue::with_endpoint(
            &pubsub,
            "proj",
            TokenProvider::new(AccessToken::Static("t0k".into())),
        )
        .with_client(client());
        let err = queue.publish("t", b"{}", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, QueueError::Publish { status: 403, .. }));
    }
}
