//! Admin session: who is signed in, with change notification.
//!
//! The session starts [`AuthState::Unknown`] and moves to `SignedIn` or
//! `SignedOut` once the identity provider has been asked to restore a prior
//! session. Admin-only operations go through [`AuthSession::require_admin`].

use crate::error::{ApiError, StorageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const SESSIONS_TREE: &str = "auth_sessions";
const CURRENT_SESSION_KEY: &[u8] = b"current";

/// Signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Startup restore has not completed.
    Unknown,
    SignedOut,
    SignedIn(Principal),
}

impl AuthState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthState::SignedIn(p) => Some(p),
            _ => None,
        }
    }
}

/// Email/password identity backend
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, ApiError>;

    /// Principal of a previously established session, if any.
    async fn restore(&self) -> Result<Option<Principal>, ApiError>;

    async fn sign_out(&self) -> Result<(), ApiError>;
}

/// Process-wide authentication state
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<AuthState>,
    restored: AtomicBool,
}

impl AuthSession {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(AuthState::Unknown);
        Self {
            provider,
            state,
            restored: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Resolve `Unknown` from the provider. Runs once; later calls return the
    /// current state. A failing provider resolves to `SignedOut`.
    pub async fn restore_on_startup(&self) -> AuthState {
        if self.restored.swap(true, Ordering::SeqCst) {
            return self.state();
        }
        let next = match self.provider.restore().await {
            Ok(Some(principal)) => {
                debug!(email = %principal.email, "Restored admin session");
                AuthState::SignedIn(principal)
            }
            Ok(None) => AuthState::SignedOut,
            Err(e) => {
                warn!(error = %e, "Session restore failed; treating as signed out");
                AuthState::SignedOut
            }
        };
        // A sign-in that landed while restore was pending wins.
        self.state.send_if_modified(|state| {
            if *state == AuthState::Unknown {
                *state = next;
                true
            } else {
                false
            }
        });
        self.state()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, ApiError> {
        let principal = self.provider.sign_in(email, password).await?;
        info!(email = %principal.email, "Signed in");
        self.state.send_replace(AuthState::SignedIn(principal.clone()));
        Ok(principal)
    }

    pub async fn sign_out(&self) -> Result<(), ApiError> {
        self.provider.sign_out().await?;
        info!("Signed out");
        self.state.send_replace(AuthState::SignedOut);
        Ok(())
    }

    /// Signed-in principal, or `Unauthorized`.
    pub fn require_admin(&self) -> Result<Principal, ApiError> {
        match self.state() {
            AuthState::SignedIn(principal) => Ok(principal),
            AuthState::Unknown => Err(ApiError::Unauthorized(
                "session has not been restored".to_string(),
            )),
            AuthState::SignedOut => Err(ApiError::Unauthorized(
                "sign in with `folio login`".to_string(),
            )),
        }
    }
}

/// Hex blake3 digest of a password, the form stored in configuration.
pub fn digest_password(password: &str) -> String {
    blake3::hash(password.as_bytes()).to_hex().to_string()
}

/// Single admin account from configuration; the session survives restarts
/// in a sled tree.
pub struct LocalIdentityProvider {
    admin_email: Option<String>,
    password_digest: Option<blake3::Hash>,
    sessions: sled::Tree,
}

impl LocalIdentityProvider {
    pub fn new(
        db: &sled::Db,
        admin_email: Option<String>,
        password_digest: Option<&str>,
    ) -> Result<Self, ApiError> {
        let password_digest = password_digest
            .map(|hex| {
                blake3::Hash::from_hex(hex.trim()).map_err(|e| {
                    ApiError::ConfigError(format!("admin.password_digest is not a blake3 hex digest: {}", e))
                })
            })
            .transpose()?;
        let sessions = db.open_tree(SESSIONS_TREE).map_err(StorageError::from)?;
        Ok(Self {
            admin_email: admin_email.map(|e| e.trim().to_string()),
            password_digest,
            sessions,
        })
    }

    fn uid_for(email: &str) -> String {
        let hex = blake3::hash(email.to_lowercase().as_bytes()).to_hex();
        hex[..16].to_string()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, ApiError> {
        let (admin_email, digest) = match (&self.admin_email, &self.password_digest) {
            (Some(e), Some(d)) => (e, d),
            _ => {
                return Err(ApiError::AuthFailed(
                    "no admin account is configured".to_string(),
                ))
            }
        };
        // blake3::Hash equality is constant-time.
        if !admin_email.eq_ignore_ascii_case(email.trim())
            || blake3::hash(password.as_bytes()) != *digest
        {
            warn!(email = %email, "Rejected sign-in");
            return Err(ApiError::AuthFailed("invalid email or password".to_string()));
        }

        let principal = Principal {
            uid: Self::uid_for(admin_email),
            email: admin_email.clone(),
        };
        let bytes = bincode::serialize(&principal).map_err(StorageError::from)?;
        self.sessions
            .insert(CURRENT_SESSION_KEY, bytes)
            .map_err(StorageError::from)?;
        self.sessions
            .flush_async()
            .await
            .map_err(StorageError::from)?;
        Ok(principal)
    }

    async fn restore(&self) -> Result<Option<Principal>, ApiError> {
        let Some(bytes) = self
            .sessions
            .get(CURRENT_SESSION_KEY)
            .map_err(StorageError::from)?
        else {
            return Ok(None);
        };
        let principal: Principal = bincode::deserialize(&bytes).map_err(StorageError::from)?;
        // A session for an account that is no longer configured is dropped.
        match &self.admin_email {
            Some(admin) if admin.eq_ignore_ascii_case(&principal.email) => Ok(Some(principal)),
            _ => Ok(None),
        }
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        self.sessions
            .remove(CURRENT_SESSION_KEY)
            .map_err(StorageError::from)?;
        self.sessions
            .flush_async()
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
