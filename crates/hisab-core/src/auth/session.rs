use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::storage::{MemoryTokenStore, StoredSession, TokenStore};
use super::Credentials;
use crate::models::UserProfile;

/// Current authentication state and cached identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<UserProfile>,
    pub credentials: Option<Credentials>,
}

impl Session {
    pub fn access_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.refresh_token.as_str())
    }

    /// Credentials present and not visibly expired. Not verified with the server.
    pub fn is_authenticated(&self) -> bool {
        self.credentials
            .as_ref()
            .map(|c| !c.looks_expired())
            .unwrap_or(false)
    }

    fn auth_state(&self) -> AuthState {
        if self.credentials.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    fn to_stored(&self) -> Option<StoredSession> {
        self.credentials
            .clone()
            .map(|credentials| StoredSession::new(credentials, self.user.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

/// The one session shared by the API client and the session store.
///
/// All reads and writes of persisted session state go through here. Memory
/// and storage are updated under the same write lock, so what is on disk
/// always matches the last in-memory transition.
pub struct SessionHandle {
    state: RwLock<Session>,
    storage: Box<dyn TokenStore>,
    refresh_guard: Mutex<()>,
    auth_tx: watch::Sender<AuthState>,
}

impl SessionHandle {
    /// Empty session over `storage`; whatever is stored is left alone until
    /// the first transition overwrites or clears it.
    pub fn new(storage: Box<dyn TokenStore>) -> Self {
        Self::with_session(storage, Session::default())
    }

    /// Session restored from `storage`. An unreadable record is discarded and
    /// the session starts unauthenticated.
    pub fn load(storage: Box<dyn TokenStore>) -> Self {
        let session = match storage.load() {
            Ok(Some(stored)) => {
                debug!(saved_at = %stored.saved_at, "Session loaded from storage");
                Session {
                    user: stored.user,
                    credentials: Some(stored.credentials),
                }
            }
            Ok(None) => {
                debug!("No stored session");
                Session::default()
            }
            Err(e) => {
                warn!(error = %e, "Discarding unreadable stored session");
                if let Err(e) = storage.clear() {
                    warn!(error = %e, "Failed to remove unreadable session");
                }
                Session::default()
            }
        };
        Self::with_session(storage, session)
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryTokenStore::new()))
    }

    fn with_session(storage: Box<dyn TokenStore>, session: Session) -> Self {
        let (auth_tx, _) = watch::channel(session.auth_state());
        Self {
            state: RwLock::new(session),
            storage,
            refresh_guard: Mutex::new(()),
            auth_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.read().user.clone()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.read().credentials.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token().map(str::to_string)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    /// Watch authentication transitions. The UI uses this to send the user
    /// back to login when a refresh fails in the middle of some other call.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.auth_tx.subscribe()
    }

    /// Install a fresh login: profile and token pair replace whatever was there.
    pub fn install(&self, user: UserProfile, credentials: Credentials) {
        let mut state = self.write();
        *state = Session {
            user: Some(user),
            credentials: Some(credentials),
        };
        self.persist(&state);
        info!("Session established");
    }

    /// Replace the cached profile wholesale. Ignored once the session is gone.
    pub fn replace_user(&self, user: UserProfile) -> bool {
        let mut state = self.write();
        if state.credentials.is_none() {
            debug!("Dropping profile update for a cleared session");
            return false;
        }
        state.user = Some(user);
        self.persist(&state);
        true
    }

    /// Store a refreshed access token, and a rotated refresh token if the
    /// server sent one. Returns false if the session was cleared meanwhile.
    pub fn replace_access_token(&self, access_token: String, refresh_token: Option<String>) -> bool {
        let mut state = self.write();
        let Some(credentials) = state.credentials.as_mut() else {
            return false;
        };
        credentials.access_token = access_token;
        if let Some(refresh_token) = refresh_token {
            credentials.refresh_token = refresh_token;
        }
        self.persist(&state);
        true
    }

    /// Drop credentials and profile, in memory and in storage.
    pub fn clear(&self) {
        let mut state = self.write();
        *state = Session::default();
        self.persist(&state);
        info!("Session cleared");
    }

    /// Serializes token refreshes: at most one in flight per session.
    pub(crate) async fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh_guard.lock().await
    }

    fn persist(&self, state: &Session) {
        let result = match state.to_stored() {
            Some(stored) => self.storage.save(&stored),
            None => self.storage.clear(),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session");
        }

        let next = state.auth_state();
        self.auth_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
