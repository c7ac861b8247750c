//! HTTP client for the annotation API
//!
//! Talks to `{base_url}/annotations` (see `routes::annotations`). Error
//! messages from the server are passed through untouched.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::AnnotationStore;
use crate::annotations::{Annotation, AnnotationDraft};
use crate::config::StoreConfig;
use crate::error::StoreError;

/// Annotation store reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Deserialize)]
struct CreateEnvelope {
    annotation: Annotation,
}

/// Failure body written by the annotation API itself
#[derive(Deserialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
}

impl HttpStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Reuse an existing client (connection pool, proxy settings)
    pub fn with_client(client: Client, config: &StoreConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        }
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/annotations{}", self.base_url, suffix)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_list(&self, param: &str, value: &str) -> Result<Vec<Annotation>, StoreError> {
        let request = self
            .client
            .get(self.endpoint(""))
            .query(&[(param, value)]);

        let response = self.authorized(request).send().await?;
        let envelope: ListEnvelope = read_json(response).await?;
        Ok(envelope.annotations)
    }
}

/// Decode a success body, or turn an error response into a `StoreError`
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    if response.status().is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()));
    }
    Err(error_from(response).await)
}

async fn error_from(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let envelope = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .filter(|e| !e.success);

    tracing::warn!(%status, error = ?envelope.as_ref().map(|e| e.error.as_str()), "Annotation API request failed");

    // a bare 404 means a wrong base URL or proxy, not a missing record
    match (status, envelope) {
        (StatusCode::NOT_FOUND, Some(envelope)) => StoreError::NotFound(envelope.error),
        (StatusCode::NOT_FOUND, None) => {
            StoreError::InvalidResponse(format!("Annotation API returned {} without an error body", status))
        }
        (_, Some(envelope)) => StoreError::Rejected(envelope.error),
        (_, None) => StoreError::Rejected(format!("Annotation API returned {}", status)),
    }
}

#[async_trait]
impl AnnotationStore for HttpStore {
    async fn list(&self, article_id: &str) -> Result<Vec<Annotation>, StoreError> {
        self.fetch_list("articleId", article_id).await
    }

    async fn list_for_author(&self, author_id: &str) -> Result<Vec<Annotation>, StoreError> {
        self.fetch_list("userId", author_id).await
    }

    async fn create(&self, draft: AnnotationDraft) -> Result<Annotation, StoreError> {
        let request = self.client.post(self.endpoint("")).json(&draft);
        let response = self.authorized(request).send().await?;
        let envelope: CreateEnvelope = read_json(response).await?;
        Ok(envelope.annotation)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("/{}", urlencoding::encode(id)));
        let response = self.authorized(self.client.delete(url)).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }
}
