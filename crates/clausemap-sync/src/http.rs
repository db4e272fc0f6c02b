//! HTTP client for the contract service's contract, finding, reanalysis, and
//! progress endpoints.

use clausemap_core::{Contract, ContractId, ContractStatus, Finding, FindingDetail, FindingId};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Acknowledgement returned when a new analysis job has been queued.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Reanalysis {
    pub id: ContractId,
    pub status: ContractStatus,
    #[serde(default)]
    pub message: String,
}

/// Client for the contract service REST API.
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for the given API base URL.
    ///
    /// `base_url` should be like `http://localhost:8080/api` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Send `token` as a bearer credential on every request.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Use a preconfigured `reqwest::Client` (timeouts, proxy settings).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one contract with its full extracted text and analysis status.
    pub async fn contract(&self, id: ContractId) -> Result<Contract, SyncError> {
        let contract: Contract = self.get_json(&format!("/contracts/{id}")).await?;
        info!(id, status = ?contract.status, chars = contract.content.len(), "fetched contract");
        Ok(contract)
    }

    /// Fetch the findings reported for a contract.
    pub async fn findings(&self, id: ContractId) -> Result<Vec<Finding>, SyncError> {
        let findings: Vec<Finding> = self.get_json(&format!("/contracts/{id}/risks")).await?;
        info!(id, count = findings.len(), "fetched findings");
        Ok(findings)
    }

    /// Fetch reason and suggestion for a single finding.
    pub async fn finding_detail(&self, id: FindingId) -> Result<FindingDetail, SyncError> {
        self.get_json(&format!("/risks/{id}")).await
    }

    /// Start a fresh analysis job over an existing contract.
    ///
    /// The contract goes back to `ANALYZING`; follow its progress feed to learn
    /// when the new findings are ready.
    pub async fn reanalyze(&self, id: ContractId) -> Result<Reanalysis, SyncError> {
        let req = self.reanalyze_request(id);
        info!(id, "requesting reanalysis");
        let resp = check_status(req.send().await?).await?;
        let ack: Reanalysis = resp.json().await?;
        info!(id, status = ?ack.status, "reanalysis started");
        Ok(ack)
    }

    fn reanalyze_request(&self, id: ContractId) -> reqwest::RequestBuilder {
        let url = format!("{}/contracts/{id}/reanalyze", self.base_url);
        self.authorize(self.client.post(url))
    }

    /// Open the server-pushed progress feed for a contract's analysis job.
    ///
    /// The returned response has a successful status; read it with
    /// [`Response::bytes_stream`](reqwest::Response::bytes_stream).
    pub async fn open_progress(&self, id: ContractId) -> Result<reqwest::Response, SyncError> {
        let url = format!("{}/contracts/{id}/progress", self.base_url);
        info!(url = %url, "opening progress feed");
        let resp = self
            .authorize(self.client.get(&url))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        check_status(resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");
        let resp = self.authorize(self.client.get(&url)).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Server {
        status: status.as_u16(),
        body,
    })
}
