//! User payload validation.
//!
//! Runs at the route boundary before any handler logic, so a rejected payload
//! never reaches the store. Every failing field is reported, not just the
//! first one.

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result, VigilError};

const NAME_MIN_CHARS: usize = 2;
const EMAIL_LOCAL_MAX: usize = 64;
const EMAIL_DOMAIN_MAX: usize = 253;

/// Raw `POST /users` body. Fields are optional so a missing field becomes a
/// field-level validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Stored user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
}

/// A payload that passed validation and is waiting for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub email: String,
    pub name: String,
}

impl UserDraft {
    pub fn into_user(self, id: u64) -> User {
        User {
            id,
            email: self.email,
            name: self.name,
        }
    }
}

impl NewUser {
    /// Check every field; on failure return all field errors at once.
    pub fn validate(self) -> Result<UserDraft> {
        let mut errors = Vec::new();

        match self.email.as_deref() {
            Some(e) if is_email(e) => {}
            _ => errors.push(FieldError::new("email", "must be a valid email address")),
        }
        match self.name.as_deref() {
            Some(n) if n.chars().count() >= NAME_MIN_CHARS => {}
            _ => errors.push(FieldError::new("name", "must be a string of at least 2 characters")),
        }

        match (self.email, self.name) {
            (Some(email), Some(name)) if errors.is_empty() => Ok(UserDraft { email, name }),
            _ => Err(VigilError::Validation(errors)),
        }
    }
}

/// Pragmatic address check: `local@domain.tld`, no whitespace, dotted
/// domain of alphanumeric/hyphen labels, alphabetic TLD of 2+ chars.
pub fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > EMAIL_LOCAL_MAX || domain.len() > EMAIL_DOMAIN_MAX {
        return false;
    }
    if local.contains('@') || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|l| {
        !l.is_empty()
            && !l.starts_with('-')
            && !l.ends_with('-')
            && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld_ok = labels
        .last()
        .map(|t| t.len() >= 2 && t.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);

    labels_ok && tld_ok
}
