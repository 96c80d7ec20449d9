use std::sync::Arc;

use axum::{extract::Request, response::Response};
use tower::{Layer, Service};

use super::{lookup::AuthLookup, SessionBackend};

/// A layer that inserts the auth lookup object into the request, for later
/// use by the Authed extractor.
#[derive(Clone)]
pub struct AuthLayer {
    sessions: SessionBackend,
}

impl AuthLayer {
    /// Create a new AuthLayer that reads sessions from the given backend
    pub fn new(sessions: SessionBackend) -> Self {
        Self { sessions }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            sessions: self.sessions.clone(),
            inner,
        }
    }
}

/// A middleware service for fetching authorization info
#[derive(Clone)]
pub struct AuthService<S> {
    sessions: SessionBackend,
    inner: S,
}

impl<S> Service<Request> for AuthService<S>
where
    S: Service<Request, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let lookup = AuthLookup::new(self.sessions.clone());
        request.extensions_mut().insert(Arc::new(lookup));
        self.inner.call(request)
    }
}
