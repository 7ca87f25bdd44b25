//! Provider client traits
//!
//! The reconciliation core talks to the provider only through these traits.
//! Lookups report "not found" as `Ok(None)`; every other failure is an
//! error. Mutations return the actions they started, if any.

use crate::action::Action;
use crate::error::Result;
use crate::model::{Firewall, FirewallRule, Labels};
use async_trait::async_trait;
use serde::Serialize;

/// Lookup capability shared by every resource kind
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    type Resource: Send;

    /// Resource kind used in messages (e.g. "firewall")
    fn kind(&self) -> &str;

    async fn get_by_id(&self, id: u64) -> Result<Option<Self::Resource>>;

    async fn get_by_name(&self, name: &str) -> Result<Option<Self::Resource>>;
}

/// Source of action status updates
#[async_trait]
pub trait ActionSource: Send + Sync {
    async fn get_action(&self, id: u64) -> Result<Action>;
}

/// Firewall operations used by the reconciler
#[async_trait]
pub trait FirewallClient: ResourceLookup<Resource = Firewall> + ActionSource {
    /// Create a firewall
    async fn create(&self, request: &CreateFirewall) -> Result<Created>;

    /// Update exactly one field of a firewall
    async fn update(&self, id: u64, update: &FirewallUpdate) -> Result<Firewall>;

    /// Replace the full rule set
    async fn set_rules(&self, id: u64, rules: &[FirewallRule]) -> Result<Vec<Action>>;

    /// Delete a firewall
    async fn delete(&self, id: u64) -> Result<Option<Action>>;
}

/// Creation payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateFirewall {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<FirewallRule>>,
}

/// Result of a create call
#[derive(Debug, Clone)]
pub struct Created {
    pub firewall: Firewall,
    pub actions: Vec<Action>,
}

/// Single-field update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FirewallUpdate {
    Name(String),
    Labels(Labels),
}

impl FirewallUpdate {
    pub fn field(&self) -> &'static str {
        match self {
            FirewallUpdate::Name(_) => "name",
            FirewallUpdate::Labels(_) => "labels",
        }
    }
}
