//! Server config loader.
//!
//! Precedence, lowest first: built-in defaults, the YAML file named by
//! `VIGIL_CONFIG` (strict parsing), then individual environment variables.

pub mod schema;

use std::fs;
use std::str::FromStr;

use vigil_core::error::{Result, VigilError};

pub use schema::{RateLimitConfig, ServerConfig};

pub const CONFIG_PATH_ENV: &str = "VIGIL_CONFIG";
pub const PORT_ENV: &str = "PORT";
pub const RATE_LIMIT_WINDOW_MS_ENV: &str = "RATE_LIMIT_WINDOW_MS";
pub const RATE_LIMIT_MAX_ENV: &str = "RATE_LIMIT_MAX";
pub const ADMIN_TOKEN_ENV: &str = "ADMIN_TOKEN";
pub const READY_FLAG_ENV: &str = "READY_FLAG";
pub const BODY_LIMIT_BYTES_ENV: &str = "BODY_LIMIT_BYTES";

pub fn load_from_file(path: &str) -> Result<ServerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| VigilError::InvalidConfig(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg: ServerConfig = serde_yaml::from_str(s)
        .map_err(|e| VigilError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Build config from the process environment.
pub fn from_env() -> Result<ServerConfig> {
    from_lookup(|k| std::env::var(k).ok())
}

/// Build config from an arbitrary variable lookup. Empty values count as unset.
pub fn from_lookup<F>(lookup: F) -> Result<ServerConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

    let mut cfg = match get(CONFIG_PATH_ENV) {
        Some(path) => load_from_file(&path)?,
        None => ServerConfig::default(),
    };

    if let Some(v) = get(PORT_ENV) {
        cfg.port = parse_var(PORT_ENV, &v)?;
    }
    if let Some(v) = get(RATE_LIMIT_WINDOW_MS_ENV) {
        cfg.rate_limit.window_ms = parse_var(RATE_LIMIT_WINDOW_MS_ENV, &v)?;
    }
    if let Some(v) = get(RATE_LIMIT_MAX_ENV) {
        cfg.rate_limit.max = parse_var(RATE_LIMIT_MAX_ENV, &v)?;
    }
    if let Some(v) = get(BODY_LIMIT_BYTES_ENV) {
        cfg.body_limit_bytes = parse_var(BODY_LIMIT_BYTES_ENV, &v)?;
    }
    if let Some(v) = lookup(ADMIN_TOKEN_ENV) {
        cfg.admin_token = v;
    }
    if let Some(v) = get(READY_FLAG_ENV) {
        cfg.ready_flag = v;
    }

    cfg.validate()?;
    Ok(cfg)
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| VigilError::InvalidConfig(format!("{name} has invalid value {raw:?}")))
}
