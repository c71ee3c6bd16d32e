//! Token validation boundary for the realtime layer.
//!
//! Session issuance belongs to the portal's auth component; this crate only
//! holds already-issued bearer tokens and answers "who is this token?". The
//! gateway never sees credentials, only [`MemberIdentity`] values.

use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use amicale_config::AuthConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid session token")]
    InvalidToken,
    #[error("session expired")]
    SessionExpired,
}

/// The authenticated identity a valid token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberIdentity {
    pub member_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

impl MemberIdentity {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

struct SessionEntry {
    identity: MemberIdentity,
    issued_at: Instant,
}

/// In-memory token -> identity map with TTL pruning.
///
/// The portal's session layer inserts entries when it issues a token; the
/// realtime gateway validates against it on every connect.
#[derive(Clone)]
pub struct SessionDirectory {
    inner: Arc<Mutex<HashMap<String, SessionEntry>>>,
    ttl: Duration,
}

impl SessionDirectory {
    pub fn new(config: &AuthConfig) -> Self {
        Self::with_ttl(Duration::from_secs(config.session_ttl_seconds))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Register an externally issued token for a member.
    pub async fn insert(&self, token: impl Into<String>, identity: MemberIdentity) {
        let mut guard = self.inner.lock().await;
        Self::prune(&mut guard, self.ttl);
        guard.insert(
            token.into(),
            SessionEntry {
                identity,
                issued_at: Instant::now(),
            },
        );
    }

    /// Issue a fresh random token for a member and register it.
    ///
    /// Only used by the debug-build dev session endpoint; production tokens
    /// come from the portal's auth component.
    pub async fn issue(&self, identity: MemberIdentity) -> String {
        let token = Self::random_token();
        self.insert(token.clone(), identity).await;
        token
    }

    /// Resolve a bearer token to the member it was issued for.
    pub async fn validate_token(&self, token: &str) -> Result<MemberIdentity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let guard = self.inner.lock().await;
        let entry = guard.get(token).ok_or(AuthError::InvalidToken)?;

        if entry.issued_at.elapsed() > self.ttl {
            return Err(AuthError::SessionExpired);
        }

        Ok(entry.identity.clone())
    }

    /// Drop a token, e.g. on logout. Unknown tokens are a no-op.
    pub async fn revoke(&self, token: &str) {
        let mut guard = self.inner.lock().await;
        if guard.remove(token).is_some() {
            debug!("session token revoked");
        }
    }

    fn random_token() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    fn prune(map: &mut HashMap<String, SessionEntry>, ttl: Duration) {
        let now = Instant::now();
        map.retain(|_, entry| now.duration_since(entry.issued_at) <= ttl);
    }
}
