//! `/users` resource backed by an in-memory table.
//!
//! Writes take the table's write lock for the whole insert, so ids stay
//! strictly increasing and unique under concurrent `POST`s.

use std::sync::RwLock;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use vigil_core::error::{Result, VigilError};
use vigil_core::validation::UserDraft;
use vigil_core::{NewUser, User};

use crate::app_state::AppState;
use crate::error::ApiError;

#[derive(Debug)]
struct UserTable {
    users: Vec<User>,
    next_id: u64,
}

#[derive(Debug)]
pub struct UserStore {
    inner: RwLock<UserTable>,
}

impl Default for UserStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(UserTable { users: Vec::new(), next_id: 1 }),
        }
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Result<Vec<User>> {
        let table = self
            .inner
            .read()
            .map_err(|_| VigilError::Internal("user store lock poisoned".into()))?;
        Ok(table.users.clone())
    }

    pub fn insert(&self, draft: UserDraft) -> Result<User> {
        let mut table = self
            .inner
            .write()
            .map_err(|_| VigilError::Internal("user store lock poisoned".into()))?;
        let user = draft.into_user(table.next_id);
        table.next_id += 1;
        table.users.push(user.clone());
        Ok(user)
    }

    pub fn len(&self) -> Result<usize> {
        self.list().map(|u| u.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }
}

pub async fn list_users(
    State(state): State<AppState>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let users = state.users().list()?;
    Ok(Json(json!({ "users": users })))
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewUser>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let Json(new_user) = payload.map_err(|rej| VigilError::BadRequest(rej.body_text()))?;
    let draft = new_user.validate()?;
    let user = state.users().insert(draft)?;
    tracing::debug!(user_id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}
