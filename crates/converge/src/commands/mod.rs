pub mod firewall;

use anyhow::Context;
use converge_cloud::{FirewallReconciler, WaitConfig};
use converge_cloud_hetzner::{HetznerClient, HetznerConfig};
use converge_config::CredentialSources;
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every command
pub struct Options {
    pub api_token: Option<String>,
    pub api_endpoint: Option<String>,
    pub config: Option<PathBuf>,
    pub check: bool,
    pub wait_timeout: u64,
}

impl Options {
    pub fn client(&self) -> anyhow::Result<HetznerClient> {
        let credentials = CredentialSources {
            api_token: self.api_token.clone(),
            api_endpoint: self.api_endpoint.clone(),
            config_path: self.config.clone(),
        }
        .resolve()?;

        tracing::debug!("Using API endpoint {}", credentials.api_endpoint);
        HetznerClient::new(HetznerConfig::new(
            credentials.api_endpoint,
            credentials.api_token,
        ))
        .context("Failed to create API client")
    }

    pub fn reconciler<'a>(&self, client: &'a HetznerClient) -> FirewallReconciler<'a, HetznerClient> {
        FirewallReconciler::new(client)
            .with_dry_run(self.check)
            .with_wait(WaitConfig::default().with_timeout(Duration::from_secs(self.wait_timeout)))
    }
}
