//! Authenticated client for a node's REST API.
//!
//! A session is opened with `POST /sessions`; the node answers with a
//! `clsession` cookie kept in an in-memory jar. Every request carries it.
//! A `401` triggers exactly one re-authentication and retry.

use std::sync::Arc;

use alloy_primitives::Address;
use automation_core::OcrKeyBundle;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{NodeError, NodeResult, cancellable};

const SESSION_COOKIE: &str = "clsession";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct Resource<A> {
    id: String,
    attributes: A,
}

#[derive(Debug, Deserialize)]
struct EthKeyAttributes {
    address: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct P2pKeyAttributes {
    peer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ocr2KeyAttributes {
    #[serde(default)]
    chain_type: String,
    onchain_public_key: String,
    offchain_public_key: String,
    config_public_key: String,
}

#[derive(Debug, Deserialize)]
struct ContractRef {
    #[serde(rename = "contractID")]
    contract_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobAttributes {
    #[serde(rename = "type")]
    job_type: String,
    #[serde(default)]
    bootstrap_spec: Option<ContractRef>,
    #[serde(default)]
    off_chain_reporting2_oracle_spec: Option<ContractRef>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: String,
}

/// A job already installed on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub id: String,
    pub job_type: String,
    pub contract_id: Option<String>,
}

/// Session-holding client for one node.
#[derive(Debug, Clone)]
pub struct NodeClient {
    base: Url,
    http: reqwest::Client,
    jar: Arc<Jar>,
    login: String,
    password: String,
}

impl NodeClient {
    pub fn new(base_url: &str, login: &str, password: &str) -> NodeResult<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| NodeError::Connection(format!("{base_url}: {e}")))?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .map_err(|e| NodeError::Connection(e.to_string()))?;
        Ok(Self {
            base,
            http,
            jar,
            login: login.to_string(),
            password: password.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    fn url(&self, path: &str) -> NodeResult<Url> {
        self.base
            .join(path)
            .map_err(|e| NodeError::Connection(format!("{path}: {e}")))
    }

    /// Open a session and retain the session cookie.
    pub async fn authenticate(&self, cancel: &CancellationToken) -> NodeResult<()> {
        let url = self.url("/sessions")?;
        let body = json!({ "email": self.login, "password": self.password });
        let resp = cancellable(cancel, async {
            self.http
                .post(url.clone())
                .json(&body)
                .send()
                .await
                .map_err(|e| NodeError::Connection(e.to_string()))
        })
        .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(NodeError::Authentication(format!(
                "{} rejected credentials for {}",
                self.base_url(),
                self.login
            )));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        let has_cookie = self
            .jar
            .cookies(&url)
            .and_then(|h| h.to_str().map(|s| s.contains(SESSION_COOKIE)).ok())
            .unwrap_or(false);
        if !has_cookie {
            return Err(NodeError::Authentication(format!(
                "{} returned no {SESSION_COOKIE} cookie",
                self.base_url()
            )));
        }
        debug!(node = %self.base_url(), "session opened");
        Ok(())
    }

    async fn send(
        &self,
        cancel: &CancellationToken,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
    ) -> NodeResult<(StatusCode, String)> {
        cancellable(cancel, async {
            let mut req = self
                .http
                .request(method.clone(), url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/json");
            if let Some(body) = body {
                req = req.body(body.to_string());
            }
            let resp = req
                .send()
                .await
                .map_err(|e| NodeError::Connection(e.to_string()))?;
            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| NodeError::Connection(e.to_string()))?;
            Ok((status, text))
        })
        .await
    }

    /// Issue a request, re-authenticating once on `401`.
    async fn request<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> NodeResult<T> {
        let (mut status, mut text) = self.send(cancel, &method, &url, body).await?;
        if status == StatusCode::UNAUTHORIZED {
            debug!(node = %self.base_url(), path = url.path(), "session expired, re-authenticating");
            self.authenticate(cancel).await?;
            (status, text) = self.send(cancel, &method, &url, body).await?;
        }
        decode(status, &text)
    }

    /// Addresses of the node's EVM keys.
    pub async fn eth_keys(&self, cancel: &CancellationToken) -> NodeResult<Vec<Address>> {
        let keys: Envelope<Vec<Resource<EthKeyAttributes>>> =
            self.request(cancel, Method::GET, self.url("/v2/keys/evm")?, None).await?;
        Ok(keys.data.into_iter().map(|k| k.attributes.address).collect())
    }

    /// Import a V3 keystore encrypted under `password`. Returns its address.
    pub async fn import_eth_key(
        &self,
        cancel: &CancellationToken,
        keystore: &Value,
        password: &str,
    ) -> NodeResult<Address> {
        let mut url = self.url("/v2/keys/evm/import")?;
        url.query_pairs_mut().append_pair("oldpassword", password);
        let key: Envelope<Resource<EthKeyAttributes>> = self
            .request(cancel, Method::POST, url, Some(keystore))
            .await?;
        Ok(key.data.attributes.address)
    }

    /// Peer id of the node's first P2P key, without the `p2p_` prefix.
    pub async fn p2p_key_id(&self, cancel: &CancellationToken) -> NodeResult<String> {
        let keys: Envelope<Vec<Resource<P2pKeyAttributes>>> =
            self.request(cancel, Method::GET, self.url("/v2/keys/p2p")?, None).await?;
        let key = keys
            .data
            .into_iter()
            .next()
            .ok_or_else(|| NodeError::Encoding("node has no P2P keys".to_string()))?;
        let peer_id = key.attributes.peer_id;
        Ok(peer_id.strip_prefix("p2p_").unwrap_or(&peer_id).to_string())
    }

    /// The node's EVM OCR2 key bundle.
    pub async fn ocr2_bundle(&self, cancel: &CancellationToken) -> NodeResult<OcrKeyBundle> {
        let bundles: Envelope<Vec<Resource<Ocr2KeyAttributes>>> =
            self.request(cancel, Method::GET, self.url("/v2/keys/ocr2")?, None).await?;
        let bundle = bundles
            .data
            .into_iter()
            .find(|b| b.attributes.chain_type.is_empty() || b.attributes.chain_type == "evm")
            .ok_or_else(|| NodeError::Encoding("node has no EVM OCR2 key bundle".to_string()))?;
        Ok(OcrKeyBundle {
            bundle_id: bundle.id,
            onchain_public_key: bundle.attributes.onchain_public_key,
            offchain_public_key: bundle.attributes.offchain_public_key,
            config_public_key: bundle.attributes.config_public_key,
        })
    }

    pub async fn jobs(&self, cancel: &CancellationToken) -> NodeResult<Vec<JobSummary>> {
        let jobs: Envelope<Vec<Resource<JobAttributes>>> =
            self.request(cancel, Method::GET, self.url("/v2/jobs")?, None).await?;
        Ok(jobs
            .data
            .into_iter()
            .map(|job| {
                let attrs = job.attributes;
                let contract_id = attrs
                    .bootstrap_spec
                    .or(attrs.off_chain_reporting2_oracle_spec)
                    .map(|spec| spec.contract_id);
                JobSummary {
                    id: job.id,
                    job_type: attrs.job_type,
                    contract_id,
                }
            })
            .collect())
    }

    /// Install a TOML job spec. Returns the job id.
    pub async fn create_job(&self, cancel: &CancellationToken, spec: &str) -> NodeResult<String> {
        let body = json!({ "toml": spec });
        let job: Envelope<Resource<Value>> = self
            .request(cancel, Method::POST, self.url("/v2/jobs")?, Some(&body))
            .await?;
        Ok(job.data.id)
    }
}

fn api_error(status: StatusCode, text: &str) -> NodeError {
    let detail = serde_json::from_str::<ErrorEnvelope>(text)
        .ok()
        .and_then(|env| env.errors.into_iter().next())
        .map(|e| e.detail)
        .unwrap_or_else(|| text.trim().to_string());
    NodeError::Api {
        status: status.as_u16(),
        detail,
    }
}

fn decode<T: DeserializeOwned>(status: StatusCode, text: &str) -> NodeResult<T> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(NodeError::Authentication(format!("node answered {status}")));
    }
    // Error envelopes can arrive with any status.
    if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(text) {
        if let Some(first) = env.errors.into_iter().next() {
            return Err(NodeError::Api {
                status: status.as_u16(),
                detail: first.detail,
            });
        }
    }
    if !status.is_success() {
        return Err(api_error(status, text));
    }
    serde_json::from_str(text).map_err(|e| NodeError::Encoding(e.to_string()))
}
