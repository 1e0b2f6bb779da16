//! In-process identity provider.
//!
//! Accounts and sessions live in memory and are lost on restart. Passwords
//! are stored as Argon2id PHC strings. Sessions expire after a fixed TTL and
//! expired entries are pruned whenever a new session opens.

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{normalize_email, validate_credentials, IdentityProvider, Session, UserInfo};
use crate::errors::{AuthError, AuthResult};

/// Default lifetime of a local session token.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
struct Account {
    user: UserInfo,
    password_hash: String,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    /// Normalized email of the account
    email: String,
    expires_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Identity provider backed by in-memory maps.
pub struct LocalIdentity {
    /// Accounts keyed by normalized email
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    session_ttl: Duration,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::with_session_ttl(std::time::Duration::from_secs(DEFAULT_SESSION_TTL_SECS))
    }

    pub fn with_session_ttl(ttl: std::time::Duration) -> Self {
        Self {
            accounts: RwLock::default(),
            sessions: RwLock::default(),
            session_ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }

    async fn open_session(&self, user: UserInfo) -> Session {
        let token = new_token();
        let now = Utc::now();
        let entry = SessionEntry {
            email: normalize_email(&user.email),
            expires_at: now
                .checked_add_signed(self.session_ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        if sessions.len() < before {
            debug!(pruned = before - sessions.len(), "Pruned expired sessions");
        }
        sessions.insert(token.clone(), entry);
        Session { user, token }
    }

    #[cfg(test)]
    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> AuthResult<Session> {
        validate_credentials(email, password)?;
        let key = normalize_email(email);

        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&key) {
                return Err(AuthError::EmailExists);
            }

            let user = UserInfo {
                uid: Uuid::new_v4().to_string(),
                email: key.clone(),
                display_name: display_name
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(ToString::to_string),
            };
            accounts.insert(
                key,
                Account {
                    user: user.clone(),
                    password_hash: hash_password(password)?,
                },
            );
            user
        };

        info!(uid = %user.uid, "Account created");
        Ok(self.open_session(user).await)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        validate_credentials(email, password)?;

        let account = self
            .accounts
            .read()
            .await
            .get(&normalize_email(email))
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash)? {
            debug!(uid = %account.user.uid, "Wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(self.open_session(account.user).await)
    }

    async fn verify(&self, token: &str) -> AuthResult<UserInfo> {
        let session = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)?;

        if session.is_expired(Utc::now()) {
            self.sessions.write().await.remove(token);
            debug!("Session expired");
            return Err(AuthError::InvalidToken);
        }

        self.accounts
            .read()
            .await
            .get(&session.email)
            .map(|account| account.user.clone())
            .ok_or(AuthError::InvalidToken)
    }

    async fn sign_out(&self, token: &str) -> AuthResult<()> {
        self.sessions.write().await.remove(token);
        Ok(())
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
