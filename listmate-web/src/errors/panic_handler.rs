use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};

use super::http_error::ErrorResponseData;

/// Turn a caught panic into a JSON 500 response
fn handle_panic(production: bool, err: Box<dyn Any + Send + 'static>) -> Response {
    let body = if production {
        ErrorResponseData::new("internal_server_error", "Server error", None)
    } else {
        let details = if let Some(s) = err.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = err.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "Unknown panic message".to_string()
        };

        ErrorResponseData::new("panic", details, None)
    };

    tracing::error!(message = body.message(), "request handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// A middleware that handles panics in the application and returns the error formatted as JSON
/// If `production` is true, this will return a generic error instead of the actual error details.
pub fn panic_handler(production: bool) -> CatchPanicLayer<impl ResponseForPanic<ResponseBody = axum::body::Body>> {
    CatchPanicLayer::custom(move |err| handle_panic(production, err))
}
