use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::SessionHandle;
use crate::api::{ApiClient, ApiError};
use crate::models::{ChangePassword, ProfileUpdate, RegistrationData, UserProfile};

/// A login or registration that did not go through.
///
/// `message` is what the server said when it said something, otherwise a
/// generic line suitable for showing to the user.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
    #[source]
    pub source: Option<ApiError>,
}

impl AuthFailure {
    fn from_api(err: ApiError, fallback: &str) -> Self {
        Self {
            message: err.user_message(fallback),
            source: Some(err),
        }
    }

    fn local(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

/// Account operations over a shared session.
#[derive(Clone)]
pub struct SessionStore {
    client: ApiClient,
}

impl SessionStore {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        self.client.session()
    }

    /// Sign in and install the returned profile and tokens as the session.
    /// On failure any existing session is left as it was.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, AuthFailure> {
        match self.client.authenticate(username, password).await {
            Ok(auth) => {
                self.session().install(auth.user.clone(), auth.tokens.into());
                info!(username = %auth.user.username, "Logged in");
                Ok(auth.user)
            }
            Err(e) => {
                warn!(username = %username, error = %e, "Login failed");
                Err(AuthFailure::from_api(e, "Login failed"))
            }
        }
    }

    /// Create an account and sign in as it. Blank required fields and
    /// mismatched passwords are rejected before anything is sent.
    pub async fn register(
        &self,
        registration: &RegistrationData,
    ) -> Result<UserProfile, AuthFailure> {
        registration.check().map_err(AuthFailure::local)?;

        match self.client.register_account(registration).await {
            Ok(auth) => {
                self.session().install(auth.user.clone(), auth.tokens.into());
                info!(username = %auth.user.username, "Registered");
                Ok(auth.user)
            }
            Err(e) => {
                warn!(username = %registration.username, error = %e, "Registration failed");
                Err(AuthFailure::from_api(e, "Registration failed"))
            }
        }
    }

    /// Clear the session, then tell the server to revoke the refresh token.
    /// The notice is best-effort; the local session is gone either way.
    pub async fn logout(&self) {
        let credentials = self.session().credentials();
        self.session().clear();

        let Some(credentials) = credentials else {
            return;
        };
        if let Err(e) = self.client.revoke_refresh_token(&credentials).await {
            debug!(error = %e, "Logout notice failed");
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.session().current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_authenticated()
    }

    /// Send the set fields and cache the profile the server returns.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        let user = self.client.put_profile(update).await?;
        self.session().replace_user(user.clone());
        debug!("Profile updated");
        Ok(user)
    }

    /// Check a stored session against the server at startup.
    ///
    /// Returns the fresh profile, or `None` when there is no session. A
    /// rejected session is cleared and the error returned. When the server
    /// cannot be reached the cached profile is returned unverified.
    pub async fn restore(&self) -> Result<Option<UserProfile>, ApiError> {
        if self.session().credentials().is_none() {
            return Ok(None);
        }

        match self.client.fetch_current_user().await {
            Ok(user) => {
                self.session().replace_user(user.clone());
                debug!(username = %user.username, "Session restored");
                Ok(Some(user))
            }
            Err(e @ (ApiError::ReauthRequired | ApiError::Unauthorized { .. })) => {
                warn!(error = %e, "Stored session rejected");
                self.session().clear();
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Could not verify stored session, using cached profile");
                Ok(self.current_user())
            }
        }
    }

    /// Returns the server's confirmation message. The session is unchanged.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<String, ApiError> {
        let change = ChangePassword {
            old_password: old_password.to_string(),
            new_password: new_password.to_string(),
        };
        let response = self.client.change_password(&change).await?;
        info!("Password changed");
        Ok(response.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::MockTransport;
    use crate::api::transport::ApiResponse;
    use crate::auth::Credentials;
    use reqwest::StatusCode;
    use serde_json::json;

    fn store_with(transport: Arc<MockTransport>) -> SessionStore {
        let session = Arc::new(SessionHandle::in_memory());
        SessionStore::new(ApiClient::with_transport(transport, session))
    }

    #[tokio::test]
    async fn test_register_checks_fields_before_sending() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(ApiResponse::with_json(StatusCode::OK, &json!({})))
        }));
        let store = store_with(transport.clone());

        let registration = RegistrationData {
            username: "alice".into(),
            password: "one".into(),
            password2: "two".into(),
            email: "alice@example.test".into(),
            ..Default::default()
        };
        let failure = store.register(&registration).await.unwrap_err();
        assert_eq!(failure.message, "Passwords do not match");
        assert!(failure.source.is_none());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_without_message_is_generic() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(ApiResponse::new(StatusCode::BAD_GATEWAY, "<html>upstream</html>"))
        }));
        let store = store_with(transport);

        let failure = store.login("alice", "secret").await.unwrap_err();
        assert_eq!(failure.message, "Login failed");
        assert!(matches!(failure.source, Some(ApiError::ServerError(_))));
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_without_session_sends_nothing() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(ApiResponse::with_json(StatusCode::OK, &json!({})))
        }));
        let store = store_with(transport.clone());

        store.logout().await;
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_restore_keeps_cached_session_when_offline() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(ApiError::NetworkError("connection refused".into()))
        }));
        let store = store_with(transport);
        let alice: UserProfile =
            serde_json::from_value(json!({"id": 1, "username": "alice"})).unwrap();
        store.session().install(alice, Credentials::new("A1", "R1"));

        let user = store.restore().await.unwrap();
        assert_eq!(user.unwrap().username, "alice");
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_without_session_is_silent() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(ApiResponse::with_json(StatusCode::OK, &json!({})))
        }));
        let store = store_with(transport.clone());

        assert!(store.restore().await.unwrap().is_none());
        assert!(transport.requests().is_empty());
    }
}
