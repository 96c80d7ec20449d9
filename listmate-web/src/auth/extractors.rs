use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use error_stack::Report;

use super::{lookup::AuthLookup, AuthError, SessionKey, UserId};
use crate::errors::WrapReport;

/// Information about the logged-in user
#[derive(Debug, Clone)]
pub struct AuthInfo {
    /// The user's ID
    pub user_id: UserId,
    /// The user's name
    pub username: String,
    /// The session used to authenticate this request
    pub session_id: SessionKey,
}

/// Extract authentication info from the Request, or return an error if the user is not
/// logged in.
#[derive(Debug, Clone)]
pub struct Authed(pub Arc<AuthInfo>);

impl Deref for Authed {
    type Target = AuthInfo;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Authed
where
    S: Send + Sync,
{
    type Rejection = WrapReport<AuthError>;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_info = get_auth_info_from_parts(parts).await?;
        Ok(Authed(auth_info))
    }
}

/// Extract the AuthInfo from Request [Parts]
pub async fn get_auth_info_from_parts(
    parts: &mut Parts,
) -> Result<Arc<AuthInfo>, Report<AuthError>> {
    let auth_lookup = parts
        .extensions
        .get::<Arc<AuthLookup>>()
        .cloned()
        .ok_or(AuthError::Unauthenticated)?;
    auth_lookup.get_auth_info(parts).await
}
