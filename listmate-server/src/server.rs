use std::{future::Future, ops::Deref, sync::Arc, time::Duration};

use axum::{
    http::{
        header::{CONTENT_TYPE, COOKIE},
        HeaderValue, Method,
    },
    routing::get,
    Router,
};
use error_stack::{Report, ResultExt};
use listmate_web::{
    auth::{middleware::AuthLayer, MemorySessionStore, SessionBackend, SessionCookieBuilder},
    errors::{panic_handler, ObfuscateErrorLayer},
};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_cookies::{cookie::SameSite, CookieManagerLayer};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{event, Level};

use crate::{models, realtime::RoomHub, Error};

/// How often expired sessions are swept from the session store
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Shared state for the server
pub struct ServerStateInner {
    /// If the app is running in production mode. This should be used sparingly as there should
    /// be a minimum of difference between production and development to prevent surprise bugs.
    pub production: bool,
    pub db: PgPool,
    pub sessions: SessionBackend,
    /// Connections subscribed to realtime updates for each list
    pub realtime: RoomHub,
}

#[derive(Clone)]
pub struct ServerState(Arc<ServerStateInner>);

impl Deref for ServerState {
    type Target = ServerStateInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Configuration for the server
pub struct Config {
    /// The environment we're running in. Currently this just distinguishes between
    /// "production" and any other value.
    pub env: String,
    /// The host to bind to.
    pub host: String,
    /// The port to bind to. Use 0 to pick a random port.
    pub port: u16,
    /// How long to wait before timing out a request
    pub request_timeout: Duration,
    pub pg_pool: PgPool,
    /// The secret used to sign session cookies
    pub session_secret: String,
    /// How long a session lasts after its last use
    pub session_expiry: Duration,
    /// The browser client's origin, allowed to make credentialed cross-origin requests
    pub frontend_url: Option<String>,
}

/// The server and related information
pub struct Server {
    /// The host the server is bound to
    pub host: String,
    /// The port the server is bound to
    pub port: u16,
    /// The server created by Axum
    pub app: Router,
    /// The server state.
    pub state: ServerState,
    /// The listener for the server
    pub listener: tokio::net::TcpListener,
}

impl Server {
    /// Run the server until a SIGINT or SIGTERM is received
    pub async fn run(self) -> Result<(), Report<Error>> {
        self.run_with_shutdown_signal(listmate_web::server::shutdown_signal())
            .await
    }

    /// Run the server, and shut it down when `shutdown_signal` resolves.
    pub async fn run_with_shutdown_signal(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), Report<Error>> {
        let cleanup_task = tokio::task::spawn(clean_sessions(self.state.sessions.clone()));

        let result = axum::serve(self.listener, self.app.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .change_context(Error::ServerStart);

        cleanup_task.abort();
        event!(Level::INFO, "Shutting down server");
        result
    }
}

async fn clean_sessions(sessions: SessionBackend) {
    let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = sessions.delete_expired_sessions().await {
            event!(Level::ERROR, error=?e, "Failed to clean up expired sessions");
        }
    }
}

fn cors_layer(frontend_url: Option<&str>) -> Result<CorsLayer, Report<Error>> {
    let Some(origin) = frontend_url else {
        // Without an allowed origin the layer adds no CORS headers.
        return Ok(CorsLayer::new());
    };

    let origin = origin
        .parse::<HeaderValue>()
        .change_context(Error::ServerStart)
        .attach_printable_lazy(|| format!("Invalid frontend URL {origin}"))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_headers([CONTENT_TYPE, COOKIE])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]))
}

/// Build the application router and bind the listener, without starting to serve requests.
pub async fn create_server(config: Config) -> Result<Server, Report<Error>> {
    let production = config.env == "production";

    // Cross-site cookies from a separately hosted client need SameSite=None, which browsers
    // only accept on secure cookies.
    let same_site = if production {
        SameSite::None
    } else {
        SameSite::Lax
    };

    let sessions = SessionBackend::new(
        Arc::new(MemorySessionStore::new()),
        SessionCookieBuilder::new(&config.session_secret, production, same_site),
        config.session_expiry,
    );

    let state = ServerState(Arc::new(ServerStateInner {
        production,
        db: config.pg_pool,
        sessions: sessions.clone(),
        realtime: RoomHub::new(),
    }));

    let app = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(crate::auth::endpoints::create_routes())
        .merge(models::todo_list::endpoints::create_routes())
        .merge(models::todo::endpoints::create_routes())
        .merge(models::access_request::endpoints::create_routes())
        .merge(crate::realtime::create_routes())
        .with_state(state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(panic_handler(production))
                .layer(ObfuscateErrorLayer::new(production))
                .layer(TimeoutLayer::new(config.request_timeout))
                .layer(cors_layer(config.frontend_url.as_deref())?)
                .layer(CookieManagerLayer::new())
                .layer(AuthLayer::new(sessions)),
        );

    let bind_ip = config
        .host
        .parse::<std::net::IpAddr>()
        .change_context(Error::ServerStart)
        .attach_printable_lazy(|| format!("Invalid host {}", config.host))?;
    let listener = tokio::net::TcpListener::bind((bind_ip, config.port))
        .await
        .change_context(Error::ServerStart)?;
    let local_addr = listener.local_addr().change_context(Error::ServerStart)?;

    event!(Level::INFO, "Listening on {local_addr}");

    Ok(Server {
        host: local_addr.ip().to_string(),
        port: local_addr.port(),
        app,
        state,
        listener,
    })
}
