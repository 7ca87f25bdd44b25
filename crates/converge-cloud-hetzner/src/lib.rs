//! Hetzner Cloud provider for converge
//!
//! This crate implements the `FirewallClient` trait against the Hetzner
//! Cloud REST API, so the converge reconciler can manage firewalls there.
//!
//! # Features
//!
//! - Firewall lookup by ID or name
//! - Create, rename, relabel, replace rules, delete
//! - Action polling through `GET /actions/{id}`
//!
//! # Example
//!
//! ```ignore
//! use converge_cloud::{FirewallReconciler, FirewallSpec, ResourceRef};
//! use converge_cloud_hetzner::{HetznerClient, HetznerConfig, DEFAULT_ENDPOINT};
//!
//! let client = HetznerClient::new(HetznerConfig::new(DEFAULT_ENDPOINT, token))?;
//! let result = FirewallReconciler::new(&client)
//!     .present(&ResourceRef::by_name("web"), &FirewallSpec::named("web"))
//!     .await?;
//! ```

pub mod client;
pub mod error;

pub use client::{DEFAULT_ENDPOINT, HetznerClient, HetznerConfig};
pub use error::{HetznerError, Result};
