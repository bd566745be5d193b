//! Resource routes.

pub mod users;
