//! Driving a firewall to its desired state
//!
//! One call reconciles one firewall: resolve it, then create, update field
//! by field, or delete, issuing only the calls needed to converge. Every
//! action a mutation starts is awaited before the result is built.

use crate::action::{ActionTracker, WaitConfig};
use crate::error::{CloudError, Result};
use crate::locator::locate;
use crate::model::{Firewall, FirewallRule, FirewallSpec, ResourceRef};
use crate::provider::{CreateFirewall, FirewallClient, FirewallUpdate};
use crate::result::ReconcileResult;
use crate::retry::ConflictRetry;
use serde::{Deserialize, Serialize};

/// Whether the firewall should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
        }
    }
}

/// One reconciliation request, as read from a manifest.
///
/// `name` doubles as the lookup key when no `id` is given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub spec: FirewallSpec,

    #[serde(default)]
    pub state: DesiredState,
}

impl ReconcileRequest {
    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            id: self.id,
            name: self.spec.name.clone(),
        }
    }
}

/// Reconciles firewalls through a [`FirewallClient`]
pub struct FirewallReconciler<'a, C: FirewallClient + ?Sized> {
    client: &'a C,
    dry_run: bool,
    wait: WaitConfig,
    conflict_retry: ConflictRetry,
}

impl<'a, C: FirewallClient + ?Sized> FirewallReconciler<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            dry_run: false,
            wait: WaitConfig::default(),
            conflict_retry: ConflictRetry::default(),
        }
    }

    /// Report intended changes without issuing mutating calls
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_conflict_retry(mut self, conflict_retry: ConflictRetry) -> Self {
        self.conflict_retry = conflict_retry;
        self
    }

    fn tracker(&self) -> ActionTracker<'a, C> {
        ActionTracker::new(self.client, self.wait.clone())
    }

    pub async fn reconcile(&self, request: &ReconcileRequest) -> Result<ReconcileResult> {
        let reference = request.reference();
        match request.state {
            DesiredState::Present => self.present(&reference, &request.spec).await,
            DesiredState::Absent => self.absent(&reference).await,
        }
    }

    /// Ensure the firewall exists and matches `spec`
    pub async fn present(&self, reference: &ResourceRef, spec: &FirewallSpec) -> Result<ReconcileResult> {
        let rules = spec.normalized_rules()?;

        match locate(self.client, reference).await? {
            None => self.create(spec, rules).await,
            Some(existing) => self.update(reference, existing, spec, rules).await,
        }
    }

    /// Ensure the firewall does not exist
    pub async fn absent(&self, reference: &ResourceRef) -> Result<ReconcileResult> {
        let Some(existing) = locate(self.client, reference).await? else {
            tracing::debug!("Firewall {} does not exist, nothing to delete", reference);
            return Ok(ReconcileResult::unchanged(None));
        };

        if self.dry_run {
            tracing::info!("[dry-run] Would delete firewall {} ({})", existing.name, existing.id);
            return Ok(ReconcileResult::new(true, None));
        }

        tracing::info!("Deleting firewall {} ({})", existing.name, existing.id);
        let client = self.client;
        let id = existing.id;
        let action = self.conflict_retry.run(move || client.delete(id)).await?;
        if let Some(action) = action {
            self.tracker().wait(action).await?;
        }

        Ok(ReconcileResult::new(true, None))
    }

    async fn create(&self, spec: &FirewallSpec, rules: Option<Vec<FirewallRule>>) -> Result<ReconcileResult> {
        let name = spec.name.clone().ok_or_else(|| CloudError::missing(&["name"]))?;
        let request = CreateFirewall {
            name,
            labels: spec.labels.clone(),
            rules,
        };

        if self.dry_run {
            tracing::info!("[dry-run] Would create firewall {}", request.name);
            return Ok(ReconcileResult::new(true, None));
        }

        tracing::info!("Creating firewall {}", request.name);
        let created = match self.client.create(&request).await {
            Ok(created) => created,
            Err(e) => return Err(e.with_params(serde_json::to_value(&request)?)),
        };
        self.tracker().wait_all(created.actions).await?;

        let firewall = self.client.get_by_id(created.firewall.id).await?;
        Ok(ReconcileResult::new(true, firewall))
    }

    /// Compare name, labels and rules in that order, one call per differing field
    async fn update(
        &self,
        reference: &ResourceRef,
        existing: Firewall,
        spec: &FirewallSpec,
        rules: Option<Vec<FirewallRule>>,
    ) -> Result<ReconcileResult> {
        let mut changed = false;

        if let Some(name) = &spec.name {
            if *name != existing.name {
                // the name was not what located the firewall, so only an id can
                if reference.id.is_none() {
                    return Err(CloudError::missing(&["id"]));
                }
                changed |= self
                    .apply_update(&existing, FirewallUpdate::Name(name.clone()))
                    .await?;
            }
        }

        if let Some(labels) = &spec.labels {
            if *labels != existing.labels {
                changed |= self
                    .apply_update(&existing, FirewallUpdate::Labels(labels.clone()))
                    .await?;
            }
        }

        if let Some(rules) = rules {
            if rules != existing.rules {
                changed |= self.apply_rules(&existing, &rules).await?;
            }
        }

        let firewall = self.client.get_by_id(existing.id).await?;
        Ok(ReconcileResult::new(changed, firewall))
    }

    async fn apply_update(&self, existing: &Firewall, update: FirewallUpdate) -> Result<bool> {
        if self.dry_run {
            tracing::info!(
                "[dry-run] Would update {} of firewall {} ({})",
                update.field(),
                existing.name,
                existing.id
            );
            return Ok(true);
        }

        tracing::info!(
            "Updating {} of firewall {} ({})",
            update.field(),
            existing.name,
            existing.id
        );
        self.client.update(existing.id, &update).await?;
        Ok(true)
    }

    async fn apply_rules(&self, existing: &Firewall, rules: &[FirewallRule]) -> Result<bool> {
        if self.dry_run {
            tracing::info!(
                "[dry-run] Would replace {} rule(s) of firewall {} ({})",
                rules.len(),
                existing.name,
                existing.id
            );
            return Ok(true);
        }

        tracing::info!(
            "Setting {} rule(s) on firewall {} ({})",
            rules.len(),
            existing.name,
            existing.id
        );
        let actions = self.client.set_rules(existing.id, rules).await?;
        self.tracker().wait_all(actions).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_manifest() {
        let yaml = r#"
id: 5
name: web
state: absent
labels:
  env: prod
"#;
        let request: ReconcileRequest = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(request.state, DesiredState::Absent);
        assert_eq!(request.reference(), ResourceRef::by_id(5).with_name("web"));
        assert_eq!(request.spec.labels.unwrap()["env"], "prod");
    }

    #[test]
    fn test_state_defaults_to_present() {
        let request: ReconcileRequest = serde_yaml::from_str("name: web").unwrap();
        assert_eq!(request.state, DesiredState::Present);
        assert!(request.id.is_none());
        assert!(request.spec.rules.is_none());
    }
}
