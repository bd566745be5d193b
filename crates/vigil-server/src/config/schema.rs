use std::fmt;

use serde::Deserialize;
use vigil_core::error::{Result, VigilError};
use vigil_core::ReadyState;

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Shared secret for `POST /admin/ready`. Empty disables the endpoint.
    #[serde(default)]
    pub admin_token: String,

    /// `down` boots not-ready; anything else boots ready.
    #[serde(default = "default_ready_flag")]
    pub ready_flag: String,

    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            rate_limit: RateLimitConfig::default(),
            admin_token: String::new(),
            ready_flag: default_ready_flag(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

// Hand-written so the admin token never ends up in logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.admin_token.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("rate_limit", &self.rate_limit)
            .field("admin_token", &token)
            .field("ready_flag", &self.ready_flag)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .finish()
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.body_limit_bytes == 0 {
            return Err(VigilError::InvalidConfig("body_limit_bytes must be greater than 0".into()));
        }
        self.rate_limit.validate()?;
        Ok(())
    }

    pub fn initial_ready_state(&self) -> ReadyState {
        ReadyState::from_boot_flag(Some(self.ready_flag.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_max")]
    pub max: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max: default_max(),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(VigilError::InvalidConfig(
                "rate_limit.window_ms must be greater than 0".into(),
            ));
        }
        if self.max == 0 {
            return Err(VigilError::InvalidConfig("rate_limit.max must be greater than 0".into()));
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    3000
}
fn default_ready_flag() -> String {
    "up".into()
}
fn default_body_limit_bytes() -> usize {
    100 * 1024
}
fn default_window_ms() -> u64 {
    60_000
}
fn default_max() -> u32 {
    60
}
