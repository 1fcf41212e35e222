use std::{fmt, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("not authenticated")]
    NotAuthenticated,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken, AuthError>;
}

/// Accepts anyone. Used when no credentials are configured.
pub struct AnonymousAuthenticator;

#[async_trait]
impl Authenticator for AnonymousAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken, AuthError> {
        Ok(SessionToken::new(format!("anonymous:{}", credentials.username)))
    }
}

/// Compares against one configured username/password pair.
pub struct StaticCredentialAuthenticator {
    username: String,
    password: String,
}

impl StaticCredentialAuthenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticCredentialAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionToken, AuthError> {
        if credentials.username == self.username && credentials.password == self.password {
            Ok(SessionToken::new(format!("session:{}", credentials.username)))
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Holds the current session token in memory only.
pub struct SessionStore {
    authenticator: Arc<dyn Authenticator>,
    token: RwLock<Option<SessionToken>>,
}

impl SessionStore {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            token: RwLock::new(None),
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<SessionToken, AuthError> {
        let token = self.authenticator.authenticate(credentials).await?;
        *self.token.write().await = Some(token.clone());
        info!("session: logged in username={}", credentials.username);
        Ok(token)
    }

    pub async fn logout(&self) {
        if self.token.write().await.take().is_some() {
            info!("session: logged out");
        }
    }

    pub async fn token(&self) -> Option<SessionToken> {
        self.token.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Gate for views that need a session.
    pub async fn require(&self) -> Result<SessionToken, AuthError> {
        self.token().await.ok_or(AuthError::NotAuthenticated)
    }
}
