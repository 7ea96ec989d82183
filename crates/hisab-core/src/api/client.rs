//! API client for the invoicing backend.
//!
//! Every request goes through [`ApiClient::execute`], which attaches the
//! session's access token and recovers from a stale token with a single
//! refresh-and-retry. Endpoint wrappers live in the sibling `auth` and
//! `invoices` modules.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use super::ApiError;
use crate::auth::SessionHandle;
use crate::config::Config;

/// Token refresh endpoint
pub const REFRESH_PATH: &str = "/auth/token/refresh/";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access: String,
    /// Present when the server rotates refresh tokens.
    #[serde(default)]
    pub refresh: Option<String>,
}

/// API client bound to one session.
/// Clone is cheap - the transport and the session are shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionHandle>,
}

impl ApiClient {
    /// Client over HTTP at `base_url`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        session: Arc<SessionHandle>,
    ) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(base_url, timeout)?;
        Ok(Self::with_transport(Arc::new(transport), session))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, session: Arc<SessionHandle>) -> Self {
        Self { transport, session }
    }

    pub fn from_config(config: &Config, session: Arc<SessionHandle>) -> Result<Self, ApiError> {
        Self::new(&config.api_url(), config.request_timeout(), session)
    }

    pub fn session(&self) -> &Arc<SessionHandle> {
        &self.session
    }

    /// Send a request, returning the response if its status is a success.
    ///
    /// Detached requests go out exactly as built. All others carry the
    /// current access token; a 401 on the first attempt triggers one token
    /// refresh and one replay. If the refresh is impossible or fails, the
    /// session is cleared and [`ApiError::ReauthRequired`] is returned.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        debug!(method = %request.method, path = %request.path, "Sending request");

        if request.is_detached() {
            let response = self.transport.send(&request).await?;
            return Self::check_response(response);
        }

        request.bearer = self.session.access_token();
        let response = self.transport.send(&request).await?;

        if response.status != StatusCode::UNAUTHORIZED || request.is_retried() {
            return Self::check_response(response);
        }

        debug!(path = %request.path, "Access token rejected");
        let access_token = self.refresh_after_rejection(request.bearer.as_deref()).await?;

        request.retried = true;
        request.bearer = Some(access_token);
        let response = self.transport.send(&request).await?;
        Self::check_response(response)
    }

    /// Execute and decode the JSON body.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        response.decode().map_err(|e| {
            warn!(path = %path, error = %e, "Unexpected response body");
            e
        })
    }

    /// Execute, discarding the response body.
    pub async fn send(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(request).await.map(|_| ())
    }

    /// Obtain an access token to replay a request that was rejected while
    /// carrying `rejected`.
    ///
    /// At most one refresh runs per session. A caller that waited on the
    /// guard while another refreshed finds a different token in the session
    /// and reuses it instead of refreshing again.
    async fn refresh_after_rejection(&self, rejected: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.session.refresh_guard().await;

        let Some(credentials) = self.session.credentials() else {
            debug!("No session to refresh");
            self.session.clear();
            return Err(ApiError::ReauthRequired);
        };

        if rejected != Some(credentials.access_token.as_str()) {
            debug!("Token already refreshed by a concurrent request");
            return Ok(credentials.access_token);
        }

        if credentials.refresh_token.is_empty() {
            warn!("No refresh token, clearing session");
            self.session.clear();
            return Err(ApiError::ReauthRequired);
        }

        let refreshed = match self.request_new_access_token(&credentials.refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.session.clear();
                return Err(ApiError::ReauthRequired);
            }
        };

        if !self
            .session
            .replace_access_token(refreshed.access.clone(), refreshed.refresh)
        {
            debug!("Session cleared during refresh");
            return Err(ApiError::ReauthRequired);
        }

        info!("Access token refreshed");
        Ok(refreshed.access)
    }

    /// Trade `refresh` for a new access token. Leaves the session alone.
    pub(crate) async fn request_new_access_token(
        &self,
        refresh: &str,
    ) -> Result<RefreshResponse, ApiError> {
        let request = ApiRequest::post(REFRESH_PATH)
            .json(&RefreshRequest { refresh })?
            .detached();
        let response = self.transport.send(&request).await?;
        Self::check_response(response)?.decode()
    }

    /// Map a non-success status to the matching [`ApiError`].
    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.text()))
        }
    }
}
