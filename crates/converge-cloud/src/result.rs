//! Caller-facing reconciliation result

use crate::model::{Direction, Firewall, FirewallRule, Labels, Protocol};
use serde::Serialize;

/// Outcome of one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileResult {
    /// True iff a mutating call was issued (or would be, in dry-run)
    pub changed: bool,

    /// The firewall after reconciliation; `None` once deleted or if it never existed
    pub firewall: Option<Firewall>,
}

impl ReconcileResult {
    pub fn new(changed: bool, firewall: Option<Firewall>) -> Self {
        Self { changed, firewall }
    }

    pub fn unchanged(firewall: Option<Firewall>) -> Self {
        Self::new(false, firewall)
    }

    /// Project into the serialized result
    pub fn project(&self) -> ReconcileOutput {
        ReconcileOutput {
            changed: self.changed,
            hcloud_firewall: self.firewall.as_ref().map(FirewallOutput::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutput {
    pub changed: bool,
    pub hcloud_firewall: Option<FirewallOutput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FirewallOutput {
    pub id: u64,
    pub name: String,
    pub labels: Labels,
    pub rules: Vec<RuleOutput>,
}

/// Every field is always present; unset optionals serialize as `null`
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutput {
    pub direction: Direction,
    pub protocol: Protocol,
    pub port: Option<String>,
    pub source_ips: Vec<String>,
    pub destination_ips: Vec<String>,
    pub description: Option<String>,
}

impl From<&Firewall> for FirewallOutput {
    fn from(firewall: &Firewall) -> Self {
        Self {
            id: firewall.id,
            name: firewall.name.clone(),
            labels: firewall.labels.clone(),
            rules: firewall.rules.iter().map(RuleOutput::from).collect(),
        }
    }
}

impl From<&FirewallRule> for RuleOutput {
    fn from(rule: &FirewallRule) -> Self {
        Self {
            direction: rule.direction,
            protocol: rule.protocol,
            port: rule.port.clone(),
            source_ips: rule.source_ips.clone(),
            destination_ips: rule.destination_ips.clone(),
            description: rule.description.clone(),
        }
    }
}
