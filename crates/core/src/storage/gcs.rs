//! Google Cloud Storage over its JSON REST API.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{ObjectStore, StoreError};
use crate::credentials::TokenProvider;

pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Vec<ListItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

impl ListPage {
    /// Append this page's names to `keys`; returns the token of the next
    /// page, if any.
    fn drain_into(self, keys: &mut Vec<String>) -> Option<String> {
        keys.extend(self.items.into_iter().map(|item| item.name));
        self.next_page_token.filter(|token| !token.is_empty())
    }
}

/// Client for one bucket.
///
/// Reuses a single `reqwest::Client` for connection pooling.
#[derive(Clone)]
pub struct GcsObjectStore {
    http: Client,
    endpoint: Url,
    bucket: String,
    auth: TokenProvider,
}

impl GcsObjectStore {
    pub fn new(bucket: impl Into<String>, auth: TokenProvider) -> Result<Self, StoreError> {
        Self::with_endpoint(DEFAULT_GCS_ENDPOINT, bucket, auth)
    }

    pub fn with_endpoint(
        endpoint: &str,
        bucket: impl Into<String>,
        auth: TokenProvider,
    ) -> Result<Self, StoreError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StoreError::Other(format!("invalid GCS endpoint '{endpoint}': {e}")))?;
        Ok(Self {
            http: Client::new(),
            endpoint,
            bucket: bucket.into(),
            auth,
        })
    }

    pub fn with_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Other("GCS endpoint cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(&["storage", "v1", "b", &self.bucket, "o"])?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("prefix", prefix);
                query.append_pair("fields", "items(name),nextPageToken");
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let request = self.auth.authorize(self.http.get(url)).await?;
            let response = check_status(request.send().await?, prefix).await?;
            let page: ListPage = response.json().await?;

            page_token = page.drain_into(&mut keys);
            if page_token.is_none() {
                break;
            }
        }

        tracing::debug!(prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut url = self.url(&["storage", "v1", "b", &self.bucket, "o", key])?;
        url.query_pairs_mut().append_pair("alt", "media");

        let request = self.auth.authorize(self.http.get(url)).await?;
        let response = check_status(request.send().await?, key).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn write(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let mut url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        let request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        let request = self.auth.authorize(request).await?;
        check_status(request.send().await?, key).await?;
        tracing::debug!(key, "Wrote object");
        Ok(())
    }
}

async fn check_status(response: Response, key: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, key, body))
}

fn status_error(status: StatusCode, key: &str, body: String) -> StoreError {
    if status == StatusCode::NOT_FOUND {
        return StoreError::NotFound(key.to_string());
    }
    StoreError::Status {
        key: key.to_string(),
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::testing::{client, serve};
    use crate::credentials::AccessToken;

    fn anonymous() -> TokenProvider {
        TokenProvider::new(AccessToken::Anonymous)
    }

    #[test]
    fn object_names_are_percent_encoded() {
        let store = GcsObjectStore::new("news-bucket", anonymous()).unwrap();
        let url = store
            .url(&["storage", "v1", "b", "news-bucket", "o", "ingestion/2025-01-02/a b.json"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/news-bucket/o/ingestion%2F2025-01-02%2Fa%20b.json"
        );
    }

    #[test]
    fn custom_endpoint_keeps_its_path() {
        let store =
            GcsObjectStore::with_endpoint("http://localhost:4443/", "b", anonymous()).unwrap();
        let url = store.url(&["storage", "v1", "b", "b", "o"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:4443/storage/v1/b/b/o");
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(GcsObjectStore::with_endpoint("not a url", "b", anonymous()).is_err());
    }

    #[test]
    fn status_mapping() {
        assert!(status_error(StatusCode::NOT_FOUND, "a.json", String::new()).is_not_found());
        match status_error(StatusCode::FORBIDDEN, "a.json", "denied".into()) {
            StoreError::Status { key, status, body } => {
                assert_eq!((key.as_str(), status, body.as_str()), ("a.json", 403, "denied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn list_page_yields_names_and_next_token() {
        let mut keys = vec!["a".to_string()];
        let page: ListPage =
            serde_json::from_str(r#"{"items":[{"name":"b"},{"name":"c"}],"nextPageToken":"p2"}"#).unwrap();
        assert_eq!(page.drain_into(&mut keys).as_deref(), Some("p2"));
        assert_eq!(keys, ["a", "b", "c"]);

        let last: ListPage = serde_json::from_str(r#"{"nextPageToken":""}"#).unwrap();
        assert_eq!(last.drain_into(&mut keys), None);
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let (base, server) = serve(vec![
            (
                200,
                r#"{"items":[{"name":"ingestion/2025-06-10/a.json"}],"nextPageToken":"page-2"}"#.into(),
            ),
            (200, r#"{"items":[{"name":"ingestion/2025-06-10/b.json"}]}"#.into()),
        ])
        .await;
        let store = GcsObjectStore::with_endpoint(&base, "news", anonymous())
            .unwrap()
            .with_client(client());

        let keys = store.list("ingestion/2025-06-10/").await.unwrap();
        assert_eq!(keys, ["ingestion/2025-06-10/a.json", "ingestion/2025-06-10/b.json"]);

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(!requests[0].contains("pageToken="));
        assert!(requests[1].contains("pageToken=page-2"));
    }

    #[tokio::test]
    async fn missing_object_reads_as_not_found() {
        let (base, _server) = serve(vec![(404, r#"{"error":{"code":404}}"#.into())]).await;
        let store = GcsObjectStore::with_endpoint(&base, "news", anonymous())
            .unwrap()
            .with_client(client());
        let err = store.read("ingestion/2025-06-10/gone.json").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn requests_carry_the_provider_token() {
        let (base, server) = serve(vec![(200, r#"{"items":[]}"#.into())]).await;
        let store = GcsObjectStore::with_endpoint(
            &base,
            "news",
            TokenProvider::new(AccessToken::Static("t0k".into())),
        )
        .unwrap()
        .with_client(client());

        assert!(store.list("x/").await.unwrap().is_empty());
        let requests = server.await.unwrap();
        assert!(requests[0].to_ascii_lowercase().contains("authorization: bearer t0k"));
    }
}
