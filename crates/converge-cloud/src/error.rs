//! Reconciliation error types

use crate::action::Action;
use serde::Serialize;
use thiserror::Error;

/// Message fragment the provider uses when a resource is still referenced
/// by others and cannot be deleted yet.
pub const IN_USE_PATTERN: &str = "is still in use";

/// Reconciliation errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("missing required parameter(s): {}", .0.join(", "))]
    MissingParameter(Vec<String>),

    #[error("Invalid parameter: {0}")]
    Validation(String),

    #[error("resource ({kind}) does not exist: {token}")]
    NotFound { kind: String, token: String },

    #[error("{0}")]
    Api(ApiError),

    #[error("{0}")]
    Action(ActionError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A rejected call together with the payload that was sent
    #[error("{source}")]
    WithParams {
        source: Box<CloudError>,
        params: serde_json::Value,
    },
}

pub type Result<T> = std::result::Result<T, CloudError>;

/// A call rejected by the provider API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    /// Machine readable error code (e.g. "conflict", "not_found")
    pub code: String,

    /// Human readable message
    pub message: String,

    /// Optional structured details
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

/// How an awaited action ended without succeeding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionErrorKind {
    /// The provider reported the action as failed
    Failed,
    /// The action was still running when the deadline passed
    Timeout,
}

/// An accepted asynchronous operation that failed or timed out.
///
/// Carries the last observed action record so callers can inspect the
/// provider's error payload without another round trip.
#[derive(Debug, Clone)]
pub struct ActionError {
    pub kind: ActionErrorKind,
    pub action: Box<Action>,
}

impl ActionError {
    pub fn failed(action: Action) -> Self {
        Self {
            kind: ActionErrorKind::Failed,
            action: Box::new(action),
        }
    }

    pub fn timeout(action: Action) -> Self {
        Self {
            kind: ActionErrorKind::Timeout,
            action: Box::new(action),
        }
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ActionErrorKind::Failed => {
                write!(f, "action {} ({}) failed", self.action.id, self.action.command)?;
                if let Some(error) = &self.action.error {
                    write!(f, ": {} ({})", error.message, error.code)?;
                }
                Ok(())
            }
            ActionErrorKind::Timeout => write!(
                f,
                "action {} ({}) timed out at {}%",
                self.action.id, self.action.command, self.action.progress
            ),
        }
    }
}

impl CloudError {
    pub fn missing(params: &[&str]) -> Self {
        CloudError::MissingParameter(params.iter().map(|p| p.to_string()).collect())
    }

    /// Attach the request payload to an error
    pub fn with_params(self, params: serde_json::Value) -> Self {
        CloudError::WithParams {
            source: Box::new(self),
            params,
        }
    }

    /// Whether this is the transient "still in use" rejection of a delete
    pub fn is_conflict_in_use(&self) -> bool {
        match self {
            CloudError::Api(api) => api.message.contains(IN_USE_PATTERN),
            CloudError::WithParams { source, .. } => source.is_conflict_in_use(),
            _ => false,
        }
    }

    /// Short name of the failure class, reported as `exception` to callers
    pub fn kind(&self) -> &'static str {
        match self {
            CloudError::MissingParameter(_) | CloudError::Validation(_) => "ValidationError",
            CloudError::NotFound { .. } => "NotFoundError",
            CloudError::Api(_) => "APIException",
            CloudError::Action(e) => match e.kind {
                ActionErrorKind::Failed => "ActionFailedException",
                ActionErrorKind::Timeout => "ActionTimeoutException",
            },
            CloudError::Transport(_) => "TransportError",
            CloudError::Json(_) => "JsonError",
            CloudError::WithParams { source, .. } => source.kind(),
        }
    }

    /// Project the error into the caller-facing failure structure
    pub fn failure(&self) -> Failure {
        if let CloudError::WithParams { source, params } = self {
            return source.failure().with_params(params.clone());
        }

        let mut detail = FailureDetail::default();
        match self {
            CloudError::Api(api) => {
                detail.code = Some(api.code.clone());
                detail.message = Some(api.message.clone());
                detail.details = api.details.clone();
            }
            CloudError::Action(e) => {
                detail.action = Some((*e.action).clone());
            }
            _ => {}
        }

        Failure {
            failed: true,
            msg: self.to_string(),
            exception: self.kind().to_string(),
            failure: detail,
        }
    }
}

/// Fatal failure reported to the caller
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub failed: bool,
    pub msg: String,
    pub exception: String,
    pub failure: FailureDetail,
}

impl Failure {
    /// Attach the request payload that was rejected
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.failure.params = Some(params);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionErrorPayload, ActionStatus};
    use chrono::Utc;

    fn failed_action() -> Action {
        Action {
            id: 42,
            command: "set_firewall_rules".to_string(),
            status: ActionStatus::Error,
            progress: 100,
            started: Utc::now(),
            finished: Some(Utc::now()),
            resources: Vec::new(),
            error: Some(ActionErrorPayload {
                code: "action_failed".to_string(),
                message: "rules could not be applied".to_string(),
            }),
        }
    }

    #[test]
    fn test_in_use_detection() {
        let err = CloudError::Api(ApiError::new(
            "resource_in_use",
            "firewall with ID 7 is still in use",
        ));
        assert!(err.is_conflict_in_use());

        let err = CloudError::Api(ApiError::new("forbidden", "insufficient permissions"));
        assert!(!err.is_conflict_in_use());

        let err = CloudError::Transport("is still in use".to_string());
        assert!(!err.is_conflict_in_use());
    }

    #[test]
    fn test_api_failure_projection() {
        let err = CloudError::Api(
            ApiError::new("invalid_input", "invalid input in field 'rules'")
                .with_details(serde_json::json!({"fields": [{"name": "rules"}]})),
        );
        let failure = err.failure();
        assert!(failure.failed);
        assert_eq!(failure.exception, "APIException");
        assert_eq!(failure.failure.code.as_deref(), Some("invalid_input"));
        assert!(failure.failure.details.is_some());
        assert!(failure.failure.action.is_none());
    }

    #[test]
    fn test_action_failure_projection() {
        let err = CloudError::Action(ActionError::failed(failed_action()));
        assert_eq!(err.kind(), "ActionFailedException");
        assert!(err.to_string().contains("rules could not be applied"));

        let json = serde_json::to_value(err.failure()).unwrap();
        assert_eq!(json["failure"]["action"]["id"], 42);
        assert_eq!(json["failure"]["action"]["error"]["code"], "action_failed");
        assert!(json["failure"].get("code").is_none());
    }

    #[test]
    fn test_params_are_attached() {
        let err = CloudError::Api(ApiError::new("uniqueness_error", "name is already used"))
            .with_params(serde_json::json!({"name": "web"}));
        assert_eq!(err.kind(), "APIException");
        assert_eq!(err.to_string(), "name is already used (uniqueness_error)");

        let failure = err.failure();
        assert_eq!(failure.failure.code.as_deref(), Some("uniqueness_error"));
        assert_eq!(failure.failure.params, Some(serde_json::json!({"name": "web"})));
    }

    #[test]
    fn test_missing_parameter_message() {
        let err = CloudError::missing(&["id", "name"]);
        assert_eq!(err.to_string(), "missing required parameter(s): id, name");
        assert_eq!(err.kind(), "ValidationError");
    }
}
