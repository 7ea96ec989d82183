//! Account endpoints.

use serde::Serialize;
use tracing::debug;

use super::transport::ApiRequest;
use super::{ApiClient, ApiError};
use crate::auth::Credentials;
use crate::models::{
    AuthResponse, ChangePassword, MessageResponse, ProfileUpdate, RegistrationData, UserProfile,
};

pub const LOGIN_PATH: &str = "/auth/login/";
pub const REGISTER_PATH: &str = "/auth/register/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const USER_PATH: &str = "/auth/user/";
pub const PROFILE_PATH: &str = "/auth/profile/";
pub const CHANGE_PASSWORD_PATH: &str = "/auth/change-password/";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LogoutRequest<'a> {
    refresh_token: &'a str,
}

impl ApiClient {
    /// Exchange a username and password for a profile and token pair.
    /// Does not touch the session; a 401 here means bad credentials.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH)
            .json(&LoginRequest { username, password })?
            .detached();
        self.fetch(request).await
    }

    pub async fn register_account(
        &self,
        registration: &RegistrationData,
    ) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post(REGISTER_PATH)
            .json(registration)?
            .detached();
        self.fetch(request).await
    }

    /// Ask the server to blacklist the refresh token in `credentials`.
    ///
    /// Sent with the given pair rather than the live session, which has
    /// normally been cleared by the time this goes out. If the access token
    /// has expired, one new one is minted from the refresh token and the
    /// notice is sent again; the session is not touched either way.
    pub async fn revoke_refresh_token(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let request = Self::logout_request(&credentials.access_token, &credentials.refresh_token)?;
        match self.send(request).await {
            Err(ApiError::Unauthorized { .. }) => {
                debug!("Logout notice rejected, retrying with a new access token");
                let refreshed = self
                    .request_new_access_token(&credentials.refresh_token)
                    .await?;
                let refresh_token = refreshed
                    .refresh
                    .as_deref()
                    .unwrap_or(&credentials.refresh_token);
                self.send(Self::logout_request(&refreshed.access, refresh_token)?)
                    .await
            }
            other => other,
        }
    }

    fn logout_request(access_token: &str, refresh_token: &str) -> Result<ApiRequest, ApiError> {
        Ok(ApiRequest::post(LOGOUT_PATH)
            .json(&LogoutRequest { refresh_token })?
            .bearer(access_token)
            .detached())
    }

    pub async fn fetch_current_user(&self) -> Result<UserProfile, ApiError> {
        self.fetch(ApiRequest::get(USER_PATH)).await
    }

    /// PUT the set fields; the server answers with the whole updated profile.
    pub async fn put_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        self.fetch(ApiRequest::put(PROFILE_PATH).json(update)?).await
    }

    pub async fn change_password(
        &self,
        change: &ChangePassword,
    ) -> Result<MessageResponse, ApiError> {
        self.fetch(ApiRequest::post(CHANGE_PASSWORD_PATH).json(change)?)
            .await
    }
}
