//! Firewall desired/observed state

use crate::error::{CloudError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// User-defined key-value labels
pub type Labels = BTreeMap<String, String>;

/// Reference to an existing resource by ID and/or name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: Option<u64>,
    pub name: Option<String>,
}

impl ResourceRef {
    pub fn by_id(id: u64) -> Self {
        Self {
            id: Some(id),
            name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Fails unless at least one of `id` and `name` is present
    pub fn require(&self) -> Result<()> {
        if self.id.is_none() && self.name.is_none() {
            return Err(CloudError::missing(&["id", "name"]));
        }
        Ok(())
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.id, &self.name) {
            (Some(id), Some(name)) => write!(f, "{} ({})", name, id),
            (Some(id), None) => write!(f, "{}", id),
            (None, Some(name)) => write!(f, "{}", name),
            (None, None) => write!(f, "<unset>"),
        }
    }
}

/// Traffic direction of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// Protocol of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
    Esp,
    Gre,
}

impl Protocol {
    /// tcp and udp rules must name a port or port range
    pub fn requires_port(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Icmp => write!(f, "icmp"),
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Esp => write!(f, "esp"),
            Protocol::Gre => write!(f, "gre"),
        }
    }
}

/// A rule as authored by the caller, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub direction: Option<Direction>,

    #[serde(default)]
    pub protocol: Option<Protocol>,

    /// Port or port range such as "80" or "1024-5000"
    #[serde(default, deserialize_with = "deserialize_opt_scalar")]
    pub port: Option<String>,

    #[serde(default)]
    pub source_ips: Option<Vec<String>>,

    #[serde(default)]
    pub destination_ips: Option<Vec<String>>,

    #[serde(default)]
    pub description: Option<String>,
}

impl RuleSpec {
    /// Validate the rule and normalize it into a provider rule
    pub fn validate(&self, index: usize) -> Result<FirewallRule> {
        let (direction, protocol) = match (self.direction, self.protocol) {
            (Some(d), Some(p)) => (d, p),
            (Some(_), None) | (None, Some(_)) => {
                return Err(CloudError::Validation(format!(
                    "rules[{}]: direction and protocol must be given together",
                    index
                )));
            }
            (None, None) => {
                return Err(CloudError::MissingParameter(vec![
                    format!("rules[{}].direction", index),
                    format!("rules[{}].protocol", index),
                ]));
            }
        };

        if protocol.requires_port() && self.port.is_none() {
            return Err(CloudError::Validation(format!(
                "rules[{}]: protocol is {} but port is missing",
                index, protocol
            )));
        }

        // icmp, esp and gre carry no port; one given anyway is dropped
        let port = if protocol.requires_port() {
            self.port.clone()
        } else {
            None
        };

        Ok(FirewallRule {
            direction,
            protocol,
            port,
            source_ips: self.source_ips.clone().unwrap_or_default(),
            destination_ips: self.destination_ips.clone().unwrap_or_default(),
            description: self.description.clone(),
        })
    }
}

/// A normalized firewall rule, as sent to and reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub direction: Direction,
    pub protocol: Protocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default)]
    pub source_ips: Vec<String>,
    #[serde(default)]
    pub destination_ips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Desired state of a firewall.
///
/// `None` fields are left untouched on update; `Some` of an empty
/// collection sets it to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallSpec {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "deserialize_labels")]
    pub labels: Option<Labels>,

    #[serde(default)]
    pub rules: Option<Vec<RuleSpec>>,
}

impl FirewallSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_rules(mut self, rules: Vec<RuleSpec>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Validate every rule, returning the normalized list if rules are set
    pub fn normalized_rules(&self) -> Result<Option<Vec<FirewallRule>>> {
        self.rules
            .as_ref()
            .map(|rules| {
                rules
                    .iter()
                    .enumerate()
                    .map(|(i, rule)| rule.validate(i))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()
    }
}

/// A server or label selector the firewall is applied to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedTo {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(flatten)]
    pub target: serde_json::Map<String, serde_json::Value>,
}

/// A firewall as observed at the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firewall {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
    #[serde(default)]
    pub applied_to: Vec<AppliedTo>,
    pub created: Option<chrono::DateTime<chrono::Utc>>,
}

fn scalar_to_string<E: serde::de::Error>(value: serde_json::Value) -> std::result::Result<String, E> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(E::custom(format!("expected a scalar, found {}", other))),
    }
}

/// Accepts `port: 80` as well as `port: "80"`
fn deserialize_opt_scalar<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<serde_json::Value>::deserialize(deserializer)?
        .map(scalar_to_string)
        .transpose()
}

/// Label values may be written as numbers or booleans in manifests
fn deserialize_labels<'de, D>(deserializer: D) -> std::result::Result<Option<Labels>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    raw.map(|map| {
        map.into_iter()
            .map(|(k, v)| scalar_to_string(v).map(|v| (k, v)))
            .collect()
    })
    .transpose()
}
