//! vigil server library entry.
//!
//! This crate wires config, the request pipeline, readiness control, metrics,
//! and the resource routes into a single axum router. It is consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod error;
pub mod middleware;
pub mod obs;
pub mod ops;
pub mod readiness;
pub mod router;
pub mod routes;
