//! Shared application state.
//!
//! Everything process-scoped (config, metrics, readiness, users, limiter) is
//! owned here and handed to handlers through axum's `State`, so each test can
//! build an isolated instance.

use std::sync::Arc;

use vigil_core::error::Result;

use crate::config::ServerConfig;
use crate::middleware::FixedWindowLimiter;
use crate::obs::{ExtraGauge, HttpMetrics};
use crate::readiness::{DependencyCheck, ReadinessController};
use crate::routes::users::UserStore;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    metrics: Arc<HttpMetrics>,
}

struct AppStateInner {
    cfg: ServerConfig,
    readiness: ReadinessController,
    users: UserStore,
    limiter: FixedWindowLimiter,
}

impl AppState {
    /// Build application state from a config. Fails if the config is invalid.
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        Self::with_checks(cfg, Vec::new())
    }

    /// Same as [`AppState::new`], with extra readiness dependency checks.
    pub fn with_checks(cfg: ServerConfig, checks: Vec<Arc<dyn DependencyCheck>>) -> Result<Self> {
        cfg.validate()?;

        let readiness = checks.into_iter().fold(
            ReadinessController::new(cfg.initial_ready_state(), cfg.admin_token.clone()),
            ReadinessController::with_check,
        );
        let limiter = FixedWindowLimiter::new(cfg.rate_limit);

        tracing::info!(ready = %readiness.query(), "application state initialised");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                readiness,
                users: UserStore::new(),
                limiter,
            }),
            metrics: Arc::new(HttpMetrics::new()),
        })
    }

    pub fn cfg(&self) -> &ServerConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Arc<HttpMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Gauges whose source of truth lives outside the registry.
    pub fn metrics_extra(&self) -> Vec<ExtraGauge> {
        vec![ExtraGauge {
            name: "vigil_ready",
            help: "1 when the readiness flag is up, 0 otherwise",
            value: if self.readiness().query().is_up() { 1.0 } else { 0.0 },
        }]
    }

    pub fn readiness(&self) -> &ReadinessController {
        &self.inner.readiness
    }

    pub fn users(&self) -> &UserStore {
        &self.inner.users
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.inner.limiter
    }
}
