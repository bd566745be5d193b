//! Readiness state value shared by config parsing and the admin endpoint.

use std::fmt;
use std::str::FromStr;

use crate::error::VigilError;

/// Administrative readiness of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyState {
    #[default]
    Up,
    Down,
}

impl ReadyState {
    pub fn is_up(self) -> bool {
        matches!(self, ReadyState::Up)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReadyState::Up => "up",
            ReadyState::Down => "down",
        }
    }

    /// Boot flag semantics: only `down` (any case) disables readiness.
    pub fn from_boot_flag(raw: Option<&str>) -> Self {
        match raw {
            Some(v) if v.trim().eq_ignore_ascii_case("down") => ReadyState::Down,
            _ => ReadyState::Up,
        }
    }
}

impl From<bool> for ReadyState {
    fn from(ready: bool) -> Self {
        if ready {
            ReadyState::Up
        } else {
            ReadyState::Down
        }
    }
}

/// Strict parser for the admin endpoint: exactly `up` or `down`.
impl FromStr for ReadyState {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(ReadyState::Up),
            "down" => Ok(ReadyState::Down),
            other => Err(VigilError::BadRequest(format!(
                "state must be one of up|down, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
