//! Core library for hisab, a client for the HisabPro invoicing API.
//!
//! - [`api`]: the HTTP client with bearer attachment and one-shot token refresh
//! - [`auth`]: the shared session, its persistent storage, and the session store
//! - [`models`]: users, invoices, and the fixed-point amounts they carry
//! - [`config`]: base URL, timeout, and storage selection

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthFailure, AuthState, SessionHandle, SessionStore};
pub use config::Config;
