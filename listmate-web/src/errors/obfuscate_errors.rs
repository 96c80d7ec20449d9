use axum::{
    extract::Request,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use super::ErrorResponseData;

/// Replaces the body of any 5xx response with a generic message, so that internal details
/// never reach the client. Client errors pass through untouched since their messages are
/// written for end users.
#[derive(Debug, Clone, Copy)]
pub struct ObfuscateErrorLayer {
    enabled: bool,
}

impl ObfuscateErrorLayer {
    /// Create the layer. When `enabled` is false, responses pass through unchanged.
    pub fn new(enabled: bool) -> ObfuscateErrorLayer {
        ObfuscateErrorLayer { enabled }
    }
}

impl<S> Layer<S> for ObfuscateErrorLayer {
    type Service = ObfuscateError<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObfuscateError {
            inner,
            enabled: self.enabled,
        }
    }
}

/// The middleware for [ObfuscateErrorLayer]
#[derive(Debug, Clone)]
pub struct ObfuscateError<S> {
    inner: S,
    enabled: bool,
}

impl<S> Service<Request> for ObfuscateError<S>
where
    S: Service<Request> + Send + 'static,
    S::Future: Send + 'static,
    S::Response: IntoResponse + Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let enabled = self.enabled;
        let fut = self.inner.call(req);
        Box::pin(async move {
            let res = fut.await?.into_response();
            let status = res.status();
            if !enabled || !status.is_server_error() {
                return Ok(res);
            }

            let body = ErrorResponseData::new("internal_error", "Server error", None);
            Ok((status, Json(body)).into_response())
        })
    }
}
