use async_trait::async_trait;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::errors::HttpError;

/// A failure to parse the request body or query string
#[derive(Debug, Error)]
pub enum Rejection {
    /// The body was missing, not JSON, or did not match the expected shape
    #[error("{}", .0.body_text())]
    Json(JsonRejection),
    /// The query string did not match the expected shape
    #[error("{}", .0.body_text())]
    Query(QueryRejection),
}

impl HttpError for Rejection {
    fn status_code(&self) -> StatusCode {
        match self {
            Rejection::Json(inner) => inner.status(),
            Rejection::Query(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_kind(&self) -> &'static str {
        match self {
            Rejection::Json(_) => "invalid_body",
            Rejection::Query(_) => "invalid_query",
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        self.to_response()
    }
}

/// JSON body extractor and response. Unlike [axum::Json], a body that fails to parse is
/// rejected with a JSON error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(Rejection::Json)?;
        Ok(Json(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query string extractor that rejects with a JSON error
#[derive(Debug, Clone, Copy, Default)]
pub struct Query<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) =
            axum::extract::Query::<T>::from_request_parts(parts, state)
                .await
                .map_err(Rejection::Query)?;
        Ok(Query(value))
    }
}
