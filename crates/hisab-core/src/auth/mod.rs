//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionHandle`: the shared session (token pair plus cached profile)
//! - `TokenStore`: where the session is persisted (file, OS keychain, memory)
//! - `SessionStore`: login, registration, logout and profile operations
//!
//! Tokens are JWTs issued by the backend; access tokens are refreshed on
//! demand by the API client.

pub mod credentials;
pub mod session;
pub mod storage;
pub mod store;

pub use credentials::Credentials;
pub use session::{AuthState, Session, SessionHandle};
pub use storage::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, StoredSession, TokenStore};
pub use store::{AuthFailure, SessionStore};
