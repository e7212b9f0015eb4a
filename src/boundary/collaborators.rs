//! Collaborator contracts consumed by the service boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decision returned by a gate evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Opaque constraints attached to an allowed action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
}

impl GateDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            constraints: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            constraints: None,
        }
    }
}

/// Decides whether an action may proceed.
pub trait GateEvaluator: Send + Sync {
    fn evaluate_gate(&self, action: &str, context: &Value) -> GateDecision;
}

/// Result of validating a share token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCheck {
    /// The token parsed and is unexpired
    pub ok: bool,
    /// The token grants the requested scope
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl TokenCheck {
    pub fn grants(&self) -> bool {
        self.ok && self.allowed
    }
}

/// Validates share tokens for a scope.
pub trait ShareTokenValidator: Send + Sync {
    fn validate_token(&self, token: &str, scope: &str) -> TokenCheck;
}
