//! Service boundary
//!
//! The vault enforces no policy of its own. Callers outside the process go
//! through [`VaultService`], which consults the collaborators it is given
//! (a gate evaluator, a share-token validator and a rate limiter) before
//! touching the store, and reports failures as redacted [`BoundaryError`]s.
//!
//! [`BoundaryError`]: vault_protocol::BoundaryError

mod collaborators;
mod rate_limit;
mod service;

pub use collaborators::{GateDecision, GateEvaluator, ShareTokenValidator, TokenCheck};
pub use rate_limit::RateLimiter;
pub use service::{CreateRequest, VaultService, CREATE_ACTION, READ_SCOPE};
