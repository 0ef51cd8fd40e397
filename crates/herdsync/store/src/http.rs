//! Digital-twins REST client.
//!
//! Talks to an endpoint exposing `GET`/`PATCH /digitaltwins/{id}` with JSON
//! patch bodies and etag preconditions. Credentials are a bearer token
//! resolved by the caller.

use std::time::Duration;

use async_trait::async_trait;
use herdsync_types::{PatchDocument, TwinId, TwinSnapshot};
use reqwest::header::{CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::TwinStore;

/// API version sent with every request unless configured otherwise.
pub const DEFAULT_API_VERSION: &str = "2023-10-31";

const JSON_PATCH: &str = "application/json-patch+json";

/// Twin store backed by a remote REST endpoint.
#[derive(Debug, Clone)]
pub struct HttpTwinStore {
    client: Client,
    endpoint: Url,
    api_version: String,
    token: String,
}

impl HttpTwinStore {
    pub fn new(
        endpoint: &str,
        api_version: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| StoreError::Rejected(format!("invalid endpoint {}: {}", endpoint, e)))?;
        if endpoint.cannot_be_a_base() {
            return Err(StoreError::Rejected(format!("endpoint {} cannot be a base URL", endpoint)));
        }
        let token = token.into();
        if token.trim().is_empty() {
            return Err(StoreError::Auth("empty bearer token".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Rejected(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_version: api_version.into(),
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", &self.api_version);
        url
    }

    fn twin_url(&self, id: &TwinId) -> Url {
        self.url(&["digitaltwins", id.as_str()])
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transient(err.to_string())
}

async fn status_error(response: Response, id: Option<&TwinId>) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = format!("{}: {}", status, body.trim());

    match status {
        StatusCode::NOT_FOUND => match id {
            Some(id) => StoreError::NotFound(id.clone()),
            None => StoreError::Rejected(detail),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Auth(detail),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => StoreError::Conflict {
            twin_id: id.cloned().unwrap_or_else(|| TwinId::new("")),
            reason: detail,
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => StoreError::Transient(detail),
        s if s.is_server_error() => StoreError::Transient(detail),
        _ => StoreError::Rejected(detail),
    }
}

#[async_trait]
impl TwinStore for HttpTwinStore {
    async fn get(&self, id: &TwinId) -> StoreResult<TwinSnapshot> {
        let url = self.twin_url(id);
        debug!(twin_id = %id, %url, "GET twin");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response, Some(id)).await);
        }

        let header_etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let document: Value = response.json().await.map_err(transport)?;
        let Value::Object(map) = document else {
            return Err(StoreError::Rejected(format!("twin {} is not a JSON object", id)));
        };
        let etag = header_etag.or_else(|| {
            map.get("$etag")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        Ok(TwinSnapshot::from_document(id.clone(), etag, map))
    }

    async fn patch(
        &self,
        id: &TwinId,
        document: &PatchDocument,
        if_match: Option<&str>,
    ) -> StoreResult<()> {
        let url = self.twin_url(id);
        let body = serde_json::to_vec(document)
            .map_err(|e| StoreError::Rejected(format!("unserializable patch: {}", e)))?;
        debug!(twin_id = %id, %url, ops = document.len(), "PATCH twin");

        let mut request = self
            .client
            .patch(url)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, JSON_PATCH)
            .body(body);
        if let Some(etag) = if_match {
            request = request.header(IF_MATCH, etag);
        }

        let response = request.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response, Some(id)).await);
        }
        Ok(())
    }

    async fn verify_access(&self) -> StoreResult<()> {
        let response = self
            .client
            .get(self.url(&["models"]))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(status_error(response, None).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(endpoint: &str) -> HttpTwinStore {
        HttpTwinStore::new(endpoint, DEFAULT_API_VERSION, "token", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_twin_url_escapes_id() {
        let url = store("https://twins.example.net").twin_url(&TwinId::new("co 01"));
        assert_eq!(
            url.as_str(),
            "https://twins.example.net/digitaltwins/co%2001?api-version=2023-10-31"
        );
    }

    #[test]
    fn test_url_keeps_base_path() {
        let url = store("https://gw.example.net/adt/").url(&["models"]);
        assert_eq!(url.as_str(), "https://gw.example.net/adt/models?api-version=2023-10-31");
    }

    #[test]
    fn test_rejects_bad_construction() {
        assert!(matches!(
            HttpTwinStore::new("not a url", DEFAULT_API_VERSION, "t", Duration::from_secs(1)),
            Err(StoreError::Rejected(_))
        ));
        assert!(matches!(
            HttpTwinStore::new("https://x.example", DEFAULT_API_VERSION, "  ", Duration::from_secs(1)),
            Err(StoreError::Auth(_))
        ));
    }
}
