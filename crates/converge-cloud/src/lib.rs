//! Converge cloud reconciliation core
//!
//! This crate reconciles the declared state of a single cloud resource
//! (a firewall) against what the provider API reports, issuing only the
//! calls needed to converge and waiting for the asynchronous actions those
//! calls start.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  converge CLI                    │
//! │          (firewall apply / delete / show)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │ ReconcileRequest
//! ┌─────────────────▼───────────────────────────────┐
//! │               converge-cloud                     │
//! │  ┌──────────┐  ┌────────────┐  ┌─────────────┐  │
//! │  │ locator  │→ │ reconcile  │→ │   result    │  │
//! │  └──────────┘  └─────┬──────┘  └─────────────┘  │
//! │          ┌───────────┴──────────┐               │
//! │  ┌───────▼──────┐      ┌────────▼───────┐       │
//! │  │ ActionTracker│      │ ConflictRetry  │       │
//! │  └──────────────┘      └────────────────┘       │
//! │         trait FirewallClient { ... }            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼────────┐
//!           │ hetzner client │
//!           └────────────────┘
//! ```

pub mod action;
pub mod error;
pub mod locator;
pub mod model;
pub mod provider;
pub mod reconcile;
pub mod result;
pub mod retry;

// Re-exports
pub use action::{Action, ActionErrorPayload, ActionResource, ActionStatus, ActionTracker, WaitConfig};
pub use error::{ActionError, ActionErrorKind, ApiError, CloudError, Failure, FailureDetail, Result};
pub use locator::{locate, resolve};
pub use model::{
    AppliedTo, Direction, Firewall, FirewallRule, FirewallSpec, Labels, Protocol, ResourceRef,
    RuleSpec,
};
pub use provider::{
    ActionSource, CreateFirewall, Created, FirewallClient, FirewallUpdate, ResourceLookup,
};
pub use reconcile::{DesiredState, FirewallReconciler, ReconcileRequest};
pub use result::{ReconcileOutput, ReconcileResult};
pub use retry::ConflictRetry;
