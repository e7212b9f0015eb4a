//! Vault operations exposed to callers outside the process.

use std::sync::Arc;

use serde_json::json;
use vault_protocol::{ArtifactBundle, ArtifactKind, BoundaryError};
use vault_store::{ArtifactStore, Payload, PutOptions, PutOutcome};

use super::collaborators::{GateEvaluator, ShareTokenValidator};
use super::rate_limit::RateLimiter;

/// Gate action evaluated before an artifact is created
pub const CREATE_ACTION: &str = "artifact.create";

/// Token scope required to read a shared artifact
pub const READ_SCOPE: &str = "artifact:read";

/// Artifact creation request
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub kind: ArtifactKind,
    pub payloads: Vec<Payload>,
    pub options: PutOptions,
}

/// Store front-end that consults collaborators before each operation
pub struct VaultService {
    store: Arc<ArtifactStore>,
    gate: Arc<dyn GateEvaluator>,
    tokens: Arc<dyn ShareTokenValidator>,
    limiter: RateLimiter,
}

impl VaultService {
    pub fn new(
        store: Arc<ArtifactStore>,
        gate: Arc<dyn GateEvaluator>,
        tokens: Arc<dyn ShareTokenValidator>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            store,
            gate,
            tokens,
            limiter,
        }
    }

    /// Create an artifact on behalf of `caller` if the gate allows it
    pub fn create(&self, caller: &str, request: CreateRequest) -> Result<PutOutcome, BoundaryError> {
        self.admit(caller)?;

        let context = json!({
            "kind": request.kind,
            "learnerId": request.options.learner_id,
            "sessionId": request.options.session_id,
            "tags": request.options.tags,
        });
        let decision = self.gate.evaluate_gate(CREATE_ACTION, &context);
        if !decision.allowed {
            tracing::info!(caller = %caller, "artifact creation denied by gate");
            return Err(BoundaryError::denied(decision.reason.as_deref()));
        }

        self.store
            .put(request.kind, request.payloads, request.options)
            .map_err(|e| e.to_boundary())
    }

    /// Read an artifact through a share token.
    ///
    /// The token must grant the read scope, and when it is bound to a learner
    /// or session the artifact must carry the same one. Artifacts outside the
    /// token's reach are reported as absent.
    pub fn fetch_shared(
        &self,
        caller: &str,
        token: &str,
        artifact_id: &str,
    ) -> Result<Option<ArtifactBundle>, BoundaryError> {
        self.admit(caller)?;

        let check = self.tokens.validate_token(token, READ_SCOPE);
        if !check.grants() {
            return Err(BoundaryError::denied(Some("share token does not grant read access")));
        }

        let Some(bundle) = self.store.get(artifact_id).map_err(|e| e.to_boundary())? else {
            return Ok(None);
        };

        let manifest = &bundle.manifest;
        let learner_ok = check
            .learner_id
            .as_deref()
            .map_or(true, |l| manifest.learner_id.as_deref() == Some(l));
        let session_ok = check
            .session_id
            .as_deref()
            .map_or(true, |s| manifest.session_id.as_deref() == Some(s));
        if !(learner_ok && session_ok) {
            return Ok(None);
        }
        Ok(Some(bundle))
    }

    fn admit(&self, caller: &str) -> Result<(), BoundaryError> {
        if self.limiter.check(caller) {
            Ok(())
        } else {
            tracing::warn!(caller = %caller, "rate limit exceeded");
            Err(BoundaryError::rate_limited())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{GateDecision, TokenCheck};
    use serde_json::Value;
    use std::time::Duration;
    use vault_protocol::ErrorCode;
    use vault_store::StoreConfig;

    struct AllowKernelRuns;

    impl GateEvaluator for AllowKernelRuns {
        fn evaluate_gate(&self, action: &str, context: &Value) -> GateDecision {
            if action == CREATE_ACTION && context["kind"] == "kernel-run" {
                GateDecision::allow()
            } else {
                GateDecision::deny("kind not allowed")
            }
        }
    }

    struct LearnerTokens;

    impl ShareTokenValidator for LearnerTokens {
        fn validate_token(&self, token: &str, scope: &str) -> TokenCheck {
            match token.strip_prefix("learner:") {
                Some(learner) => TokenCheck {
                    ok: true,
                    allowed: scope == READ_SCOPE,
                    learner_id: Some(learner.to_string()),
                    session_id: None,
                },
                None => TokenCheck::default(),
            }
        }
    }

    fn service(max_requests: u32) -> VaultService {
        VaultService::new(
            Arc::new(ArtifactStore::in_memory(StoreConfig::default())),
            Arc::new(AllowKernelRuns),
            Arc::new(LearnerTokens),
            RateLimiter::new(Duration::from_secs(60), max_requests, 64),
        )
    }

    fn request(kind: ArtifactKind, id: &str, learner: &str) -> CreateRequest {
        CreateRequest {
            kind,
            payloads: vec![Payload::new(
                "kernel_run",
                json!({"outcome": "S1", "confidence": "High"}),
            )],
            options: PutOptions {
                artifact_id: Some(id.to_string()),
                learner_id: Some(learner.to_string()),
                ..PutOptions::default()
            },
        }
    }

    #[test]
    fn test_gate_allows_and_denies() {
        let service = service(100);
        assert!(service.create("c1", request(ArtifactKind::KernelRun, "kr-1", "l1")).is_ok());

        let err = service
            .create("c1", request(ArtifactKind::Bundle, "b-1", "l1"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Denied);
        assert!(err.message.contains("kind not allowed"));
    }

    #[test]
    fn test_store_errors_cross_boundary_redacted() {
        let service = service(100);
        let err = service
            .create("c1", request(ArtifactKind::KernelRun, "bad id", "l1"))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_fetch_shared_scoped_to_learner() {
        let service = service(100);
        service
            .create("c1", request(ArtifactKind::KernelRun, "kr-1", "l1"))
            .unwrap();

        assert!(service.fetch_shared("c2", "learner:l1", "kr-1").unwrap().is_some());
        assert!(service.fetch_shared("c2", "learner:l2", "kr-1").unwrap().is_none());
        assert!(service.fetch_shared("c2", "learner:l1", "missing").unwrap().is_none());

        let err = service.fetch_shared("c2", "garbage", "kr-1").unwrap_err();
        assert_eq!(err.code, ErrorCode::Denied);
    }

    #[test]
    fn test_rate_limit_applies_per_caller() {
        let service = service(1);
        assert!(service.fetch_shared("c1", "learner:l1", "x").is_ok());
        let err = service.fetch_shared("c1", "learner:l1", "x").unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimited);
        assert!(service.fetch_shared("c2", "learner:l1", "x").is_ok());
    }
}
