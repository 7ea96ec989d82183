//! REST API client for the invoicing backend.
//!
//! This module provides the `ApiClient` for the account and invoice
//! endpoints. Requests carry the session's JWT access token as a bearer
//! credential; an expired token is refreshed once per failed request
//! through `/auth/token/refresh/`.

pub mod auth;
pub mod client;
pub mod error;
pub mod invoices;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use invoices::is_valid_invoice_id;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
