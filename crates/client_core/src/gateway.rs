use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{LaunchId, Resource, RocketId},
    error::FetchFailure,
    protocol::{Launch, Rocket},
};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.spacexdata.com/v4";

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub base_url: String,
    /// No timeout is applied when unset.
    pub request_timeout: Option<Duration>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: None,
        }
    }
}

/// Read-only access to the launch API. Every call is a single network read with no retry.
#[async_trait]
pub trait LaunchGateway: Send + Sync {
    async fn fetch_launches(&self) -> Result<Vec<Launch>, FetchFailure>;
    async fn fetch_launch(&self, id: &LaunchId) -> Result<Launch, FetchFailure>;
    async fn fetch_rocket(&self, id: &RocketId) -> Result<Rocket, FetchFailure>;
}

pub struct HttpGateway {
    http: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(options: &GatewayOptions) -> anyhow::Result<Self> {
        let base_url = parse_base_url(&options.base_url)?;
        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/{resource}` or `{base}/{resource}/{id}`, keeping any path already on the base.
    pub fn endpoint(&self, resource: Resource, id: Option<&str>) -> Result<Url, FetchFailure> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                FetchFailure::network(resource, id, "api base url cannot carry path segments")
            })?;
            segments.pop_if_empty().push(resource.path());
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    pub async fn fetch_collection<T: DeserializeOwned>(
        &self,
        resource: Resource,
    ) -> Result<Vec<T>, FetchFailure> {
        self.get_json(resource, None).await
    }

    pub async fn fetch_by_id<T: DeserializeOwned>(
        &self,
        resource: Resource,
        id: &str,
    ) -> Result<T, FetchFailure> {
        self.get_json(resource, Some(id)).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: Resource,
        id: Option<&str>,
    ) -> Result<T, FetchFailure> {
        let url = self.endpoint(resource, id)?;
        debug!("gateway: GET {url}");

        let response = self.http.get(url.clone()).send().await.map_err(|err| {
            warn!("gateway: request failed url={url} error={err}");
            FetchFailure::network(resource, id, err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("gateway: non-success status url={url} status={status}");
            return Err(FetchFailure::http_status(resource, id, status.as_u16()));
        }

        // The whole body is buffered before decoding so a truncated read is a network failure
        // rather than a partially decoded entity.
        let body = response.bytes().await.map_err(|err| {
            warn!("gateway: body read failed url={url} error={err}");
            FetchFailure::network(resource, id, err.to_string())
        })?;

        serde_json::from_slice(&body).map_err(|err| {
            warn!("gateway: undecodable body url={url} error={err}");
            FetchFailure::decode(resource, id, err.to_string())
        })
    }
}

#[async_trait]
impl LaunchGateway for HttpGateway {
    async fn fetch_launches(&self) -> Result<Vec<Launch>, FetchFailure> {
        self.fetch_collection(Resource::Launches).await
    }

    async fn fetch_launch(&self, id: &LaunchId) -> Result<Launch, FetchFailure> {
        self.fetch_by_id(Resource::Launches, id.as_str()).await
    }

    async fn fetch_rocket(&self, id: &RocketId) -> Result<Rocket, FetchFailure> {
        self.fetch_by_id(Resource::Rockets, id.as_str()).await
    }
}

pub fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid api base url '{raw}'"))?;
    if url.cannot_be_a_base() {
        return Err(anyhow!("api base url '{raw}' cannot carry path segments"));
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
