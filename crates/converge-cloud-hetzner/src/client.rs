//! Hetzner Cloud API client
//!
//! Direct REST implementation of the firewall and action endpoints,
//! authenticated with a Bearer token.

use crate::error::{HetznerError, Result};
use async_trait::async_trait;
use converge_cloud::{
    Action, ActionSource, ApiError, CloudError, CreateFirewall, Created, Firewall,
    FirewallClient, FirewallRule, FirewallUpdate, ResourceLookup,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://api.hetzner.cloud/v1";

const USER_AGENT: &str = concat!("converge/", env!("CARGO_PKG_VERSION"));

/// Maximum length of response body to log
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body and drop control characters before logging it
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = body
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= MAX_LOG_BODY_LENGTH)
            .last()
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// Configuration for the API client
#[derive(Clone)]
pub struct HetznerConfig {
    pub endpoint: String,
    pub token: String,
}

impl HetznerConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for HetznerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HetznerConfig")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Hetzner Cloud firewall client
pub struct HetznerClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HetznerClient {
    pub fn new(config: HetznerConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(HetznerError::MissingToken);
        }
        if !config.endpoint.starts_with("http://") && !config.endpoint.starts_with("https://") {
            return Err(HetznerError::InvalidEndpoint(config.endpoint));
        }

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Send a request and return the response body, `None` for an empty one
    async fn send(&self, request: RequestBuilder, label: &str) -> converge_cloud::Result<Option<String>> {
        tracing::debug!("{}", label);

        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CloudError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!("{} -> {}: {}", label, status, sanitize_for_log(&body));
            return Err(CloudError::Api(decode_error(status, &body)));
        }

        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(body))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, label: &str) -> converge_cloud::Result<T> {
        let body = self.send(request, label).await?.ok_or_else(|| {
            CloudError::Transport(format!("{}: empty response body", label))
        })?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Map a non-success response into an API error
fn decode_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let mut error = ApiError::new(envelope.error.code, envelope.error.message);
            error.details = envelope.error.details.filter(|d| !d.is_null());
            error
        }
        Err(_) => ApiError::new(
            format!("http_{}", status.as_u16()),
            format!("request failed with status {}", status),
        ),
    }
}

fn is_not_found(error: &CloudError) -> bool {
    matches!(error, CloudError::Api(api) if api.code == "not_found")
}

#[async_trait]
impl ResourceLookup for HetznerClient {
    type Resource = Firewall;

    fn kind(&self) -> &str {
        "firewall"
    }

    async fn get_by_id(&self, id: u64) -> converge_cloud::Result<Option<Firewall>> {
        let path = format!("/firewalls/{}", id);
        let request = self.client.get(self.url(&path));
        match self
            .fetch::<FirewallEnvelope>(request, &format!("GET {}", path))
            .await
        {
            Ok(envelope) => Ok(Some(envelope.firewall)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_by_name(&self, name: &str) -> converge_cloud::Result<Option<Firewall>> {
        let request = self
            .client
            .get(self.url("/firewalls"))
            .query(&[("name", name)]);
        let list: FirewallList = self
            .fetch(request, &format!("GET /firewalls?name={}", name))
            .await?;
        Ok(list.firewalls.into_iter().next())
    }
}

#[async_trait]
impl ActionSource for HetznerClient {
    async fn get_action(&self, id: u64) -> converge_cloud::Result<Action> {
        let path = format!("/actions/{}", id);
        let request = self.client.get(self.url(&path));
        let envelope: ActionEnvelope = self.fetch(request, &format!("GET {}", path)).await?;
        Ok(envelope.action)
    }
}

#[async_trait]
impl FirewallClient for HetznerClient {
    async fn create(&self, create: &CreateFirewall) -> converge_cloud::Result<Created> {
        let request = self.client.post(self.url("/firewalls")).json(create);
        let response: CreateResponse = self.fetch(request, "POST /firewalls").await?;
        Ok(Created {
            firewall: response.firewall,
            actions: response.actions,
        })
    }

    async fn update(&self, id: u64, update: &FirewallUpdate) -> converge_cloud::Result<Firewall> {
        let path = format!("/firewalls/{}", id);
        let request = self.client.put(self.url(&path)).json(update);
        let envelope: FirewallEnvelope = self.fetch(request, &format!("PUT {}", path)).await?;
        Ok(envelope.firewall)
    }

    async fn set_rules(&self, id: u64, rules: &[FirewallRule]) -> converge_cloud::Result<Vec<Action>> {
        let path = format!("/firewalls/{}/actions/set_rules", id);
        let request = self
            .client
            .post(self.url(&path))
            .json(&SetRulesRequest { rules });
        let envelope: ActionsEnvelope = self.fetch(request, &format!("POST {}", path)).await?;
        Ok(envelope.actions)
    }

    async fn delete(&self, id: u64) -> converge_cloud::Result<Option<Action>> {
        let path = format!("/firewalls/{}", id);
        let request = self.client.delete(self.url(&path));
        let body = self.send(request, &format!("DELETE {}", path)).await?;
        match body {
            Some(body) => Ok(serde_json::from_str::<OptionalAction>(&body)?.action),
            None => Ok(None),
        }
    }
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    code: String,
    message: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FirewallEnvelope {
    firewall: Firewall,
}

#[derive(Debug, Deserialize)]
struct FirewallList {
    #[serde(default)]
    firewalls: Vec<Firewall>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    firewall: Firewall,
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct ActionEnvelope {
    action: Action,
}

#[derive(Debug, Deserialize)]
struct ActionsEnvelope {
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct OptionalAction {
    #[serde(default)]
    action: Option<Action>,
}

#[derive(Debug, Serialize)]
struct SetRulesRequest<'a> {
    rules: &'a [FirewallRule],
}
