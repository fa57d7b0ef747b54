//! HTTP implementation of the cluster data source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use sfx_core::{
    ApplicationInfo, ClusterConfig, ClusterDataSource, ClusterHealth, FetchError, NodeInfo,
    PartitionInfo, ReplicaInfo, ServiceInfo,
};

use crate::error::ClientError;
use crate::wire::{
    ApplicationWire, ClusterHealthWire, ErrorEnvelope, NodeWire, PagedList, PartitionWire,
    ReplicaWire, ServiceWire,
};

/// Upper bound on pages followed for one listing.
const MAX_PAGES: usize = 1_000;

/// Data source backed by the cluster's REST management endpoint.
#[derive(Clone)]
pub struct RestDataSource {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    headers: HeaderMap,
}

impl std::fmt::Debug for RestDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDataSource")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl RestDataSource {
    pub fn new(config: &ClusterConfig) -> Result<Self, ClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let headers = build_auth_headers(config.bearer_token.as_deref())?;
        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            headers,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(&self, path: &str, continuation: Option<&str>) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .query(&[("api-version", self.api_version.as_str())]);
        if let Some(token) = continuation {
            request = request.query(&[("ContinuationToken", token)]);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    /// Follow continuation tokens until the listing is exhausted.
    async fn get_paged<W>(&self, path: &str) -> Result<Vec<W>, ClientError>
    where
        W: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        for page_number in 0..MAX_PAGES {
            let page: PagedList<W> = self.get_json(path, token.as_deref()).await?;
            let next = page.next_token().map(str::to_string);
            items.extend(page.items);
            match next {
                Some(next) => {
                    tracing::trace!(path, page = page_number + 1, "following continuation token");
                    token = Some(next);
                }
                None => return Ok(items),
            }
        }
        Err(ClientError::InvalidResponse(format!(
            "{path} did not finish paging after {MAX_PAGES} pages"
        )))
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        } else {
            let text = response.text().await?;
            let message = match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => format!("{}: {}", envelope.error.code, envelope.error.message),
                Err(_) => text,
            };
            Err(ClientError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn list<W, R>(&self, path: &str) -> Result<Vec<R>, FetchError>
    where
        W: DeserializeOwned,
        R: TryFrom<W>,
        ClientError: From<R::Error>,
    {
        let result = async {
            self.get_paged::<W>(path)
                .await?
                .into_iter()
                .map(|wire| R::try_from(wire).map_err(ClientError::from))
                .collect::<Result<Vec<R>, ClientError>>()
        }
        .await;
        result.map_err(|e| {
            tracing::debug!(path, error = %e, "listing failed");
            e.into_fetch_error(path)
        })
    }
}

#[async_trait]
impl ClusterDataSource for RestDataSource {
    async fn cluster_health(&self) -> Result<ClusterHealth, FetchError> {
        let path = "/$/GetClusterHealth";
        self.get_json::<ClusterHealthWire>(path, None)
            .await
            .map(ClusterHealth::from)
            .map_err(|e| e.into_fetch_error(path))
    }

    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, FetchError> {
        self.list::<NodeWire, NodeInfo>("/Nodes").await
    }

    async fn list_applications(&self) -> Result<Vec<ApplicationInfo>, FetchError> {
        self.list::<ApplicationWire, ApplicationInfo>("/Applications").await
    }

    async fn list_services(&self, application_id: &str) -> Result<Vec<ServiceInfo>, FetchError> {
        let path = format!("/Applications/{application_id}/$/GetServices");
        self.list::<ServiceWire, ServiceInfo>(&path).await
    }

    async fn list_partitions(&self, service_id: &str) -> Result<Vec<PartitionInfo>, FetchError> {
        let path = format!("/Services/{service_id}/$/GetPartitions");
        self.list::<PartitionWire, PartitionInfo>(&path).await
    }

    async fn list_replicas(&self, partition_id: &str) -> Result<Vec<ReplicaInfo>, FetchError> {
        let path = format!("/Partitions/{partition_id}/$/GetReplicas");
        self.list::<ReplicaWire, ReplicaInfo>(&path).await
    }
}

fn build_auth_headers(bearer_token: Option<&str>) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = bearer_token {
        let value = format!("Bearer {}", token);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&value).map_err(|e| ClientError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str, token: Option<&str>) -> ClusterConfig {
        ClusterConfig {
            name: "c1".to_string(),
            endpoint: endpoint.to_string(),
            api_version: "6.0".to_string(),
            request_timeout_ms: 1_000,
            bearer_token: token.map(str::to_string),
        }
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let source = RestDataSource::new(&config("http://localhost:19080/", None)).unwrap();
        assert_eq!(source.base_url(), "http://localhost:19080");
    }

    #[test]
    fn test_bearer_header() {
        let headers = build_auth_headers(Some("abc")).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
        assert!(build_auth_headers(None).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_token_is_config_error() {
        let err = build_auth_headers(Some("bad\ntoken")).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
