//! Readiness controller.
//!
//! Two states, `up` and `down`. The boot state comes from config; after that
//! only an admin holding the configured token can flip it. The flag is a
//! single atomic, so concurrent probes never see a torn value.
//!
//! Readiness additionally consults a list of [`DependencyCheck`]s; every check
//! must pass for the probe to report ready.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use vigil_core::error::{Result, VigilError};
use vigil_core::ReadyState;

/// Extension point for gating readiness on downstream health.
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    fn name(&self) -> &'static str;
    async fn healthy(&self) -> bool;
}

/// Placeholder check; always healthy.
pub struct NoopCheck;

#[async_trait]
impl DependencyCheck for NoopCheck {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn healthy(&self) -> bool {
        true
    }
}

pub struct ReadinessController {
    ready: AtomicBool,
    admin_token: String,
    checks: Vec<Arc<dyn DependencyCheck>>,
}

impl ReadinessController {
    pub fn new(initial: ReadyState, admin_token: impl Into<String>) -> Self {
        Self {
            ready: AtomicBool::new(initial.is_up()),
            admin_token: admin_token.into(),
            checks: vec![Arc::new(NoopCheck)],
        }
    }

    pub fn with_check(mut self, check: Arc<dyn DependencyCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// Current administrative state. No side effects.
    pub fn query(&self) -> ReadyState {
        ReadyState::from(self.ready.load(Ordering::Acquire))
    }

    /// Constant-time token check. An unset token never authorizes.
    pub fn authorize(&self, presented: Option<&str>) -> Result<()> {
        let ok = match presented {
            Some(p) if !self.admin_token.is_empty() => {
                bool::from(self.admin_token.as_bytes().ct_eq(p.as_bytes()))
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            tracing::warn!("readiness change rejected: bad admin token");
            Err(VigilError::Unauthorized)
        }
    }

    /// Transition to `state` iff the token matches. Returns the new state.
    pub fn set(&self, state: ReadyState, presented: Option<&str>) -> Result<ReadyState> {
        self.authorize(presented)?;
        Ok(self.store(state))
    }

    /// Admin endpoint entry: token first, then the raw `state` value.
    pub fn transition(
        &self,
        requested: Option<&str>,
        presented: Option<&str>,
    ) -> Result<ReadyState> {
        self.authorize(presented)?;
        let state: ReadyState = requested
            .ok_or_else(|| {
                VigilError::BadRequest("missing state parameter (expected up|down)".into())
            })?
            .parse()?;
        Ok(self.store(state))
    }

    fn store(&self, state: ReadyState) -> ReadyState {
        let prev = ReadyState::from(self.ready.swap(state.is_up(), Ordering::AcqRel));
        if prev != state {
            tracing::info!(from = %prev, to = %state, "readiness changed");
        }
        state
    }

    /// Readiness probe: admin flag plus every dependency check.
    pub async fn probe(&self) -> ReadyState {
        if !self.query().is_up() {
            return ReadyState::Down;
        }
        for check in &self.checks {
            if !check.healthy().await {
                tracing::debug!(check = check.name(), "dependency check failed");
                return ReadyState::Down;
            }
        }
        ReadyState::Up
    }
}
