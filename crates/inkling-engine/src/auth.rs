use async_trait::async_trait;

use crate::store::OwnerId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,
}

/// Who (if anyone) the current session belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Authenticated { owner: OwnerId },
    Anonymous,
}

impl SessionStatus {
    pub fn owner(&self) -> Result<&OwnerId, AuthError> {
        match self {
            SessionStatus::Authenticated { owner } => Ok(owner),
            SessionStatus::Anonymous => Err(AuthError::NotAuthenticated),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated { .. })
    }
}

/// Answers "is there an authenticated session right now?".
///
/// Checked before every completion request and every save, so an
/// implementation backed by an expiring session is consulted each time.
#[async_trait]
pub trait SessionCheck: Send + Sync {
    async fn check_session(&self) -> SessionStatus;
}

/// A fixed single-user session for local use
#[derive(Debug, Clone)]
pub struct LocalSession {
    owner: OwnerId,
}

impl LocalSession {
    pub fn new(owner: OwnerId) -> Self {
        Self { owner }
    }
}

#[async_trait]
impl SessionCheck for LocalSession {
    async fn check_session(&self) -> SessionStatus {
        SessionStatus::Authenticated {
            owner: self.owner.clone(),
        }
    }
}

/// A session that is never authenticated
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousSession;

#[async_trait]
impl SessionCheck for AnonymousSession {
    async fn check_session(&self) -> SessionStatus {
        SessionStatus::Anonymous
    }
}
