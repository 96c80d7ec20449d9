use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use error_stack::{Report, ResultExt};
use tokio::sync::Mutex;
use tower_cookies::Cookies;

use super::{AuthError, AuthInfo, SessionBackend};

/// Fetches the current user from the session cookie. The result is cached so that multiple
/// extractors in the same request only hit the session store once.
pub struct AuthLookup {
    info: Mutex<Option<Arc<AuthInfo>>>,
    sessions: SessionBackend,
}

impl AuthLookup {
    /// Create a new AuthLookup
    pub fn new(sessions: SessionBackend) -> Self {
        Self {
            info: Mutex::new(None),
            sessions,
        }
    }

    async fn fetch_auth_info(&self, request: &mut Parts) -> Result<Arc<AuthInfo>, Report<AuthError>> {
        // Missing cookie middleware means there can't be a session.
        let cookies = Cookies::from_request_parts(request, &())
            .await
            .map_err(|_| Report::new(AuthError::Unauthenticated))?;

        let (session_id, data) = self
            .sessions
            .get_session(&cookies)
            .await
            .change_context(AuthError::SessionBackend)?
            .ok_or(AuthError::Unauthenticated)?;

        Ok(Arc::new(AuthInfo {
            user_id: data.user_id,
            username: data.username,
            session_id,
        }))
    }

    /// Return the authorization info, fetching it if it hasn't yet been fetched for this request.
    pub async fn get_auth_info(&self, request: &mut Parts) -> Result<Arc<AuthInfo>, Report<AuthError>> {
        let mut info = self.info.lock().await;
        if let Some(info) = info.as_ref() {
            return Ok(info.clone());
        }

        let fetched = self.fetch_auth_info(request).await?;
        *info = Some(fetched.clone());

        Ok(fetched)
    }
}
