use std::{borrow::Cow, fmt::Debug, ops::Deref};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use error_stack::Report;
use serde::Serialize;
use tracing::{event, Level};

/// Extra fields merged into an error response body, next to `error` and `kind`.
pub type ErrorDetail = serde_json::Map<String, serde_json::Value>;

/// An error that can be returned from an HTTP endpoint
pub trait HttpError: ToString + std::fmt::Debug {
    /// The status code that the error should return.
    fn status_code(&self) -> StatusCode;
    /// An error code that may provide additional information to clients on how to behave in
    /// response to the error.
    fn error_kind(&self) -> &'static str;

    /// Extra detail about this error
    fn error_detail(&self) -> Option<ErrorDetail> {
        None
    }

    /// The status code and data for this error. Most implementors of this trait will not
    /// need to override the default implementation.
    fn response_tuple(&self) -> (StatusCode, ErrorResponseData) {
        let code = self.status_code();
        let data = ErrorResponseData::new(self.error_kind(), self.to_string(), self.error_detail());
        if code.is_server_error() {
            event!(Level::ERROR, kind=%data.kind, message=%data.error, details=?data.details);
        } else {
            event!(Level::DEBUG, kind=%data.kind, message=%data.error, details=?data.details);
        }

        (code, data)
    }

    /// Convert the error into a [Response]. Most implementors of this trait will not
    /// need to override the default implementation.
    fn to_response(&self) -> Response {
        let (code, json) = self.response_tuple();
        (code, Json(json)).into_response()
    }
}

impl<T> HttpError for error_stack::Report<T>
where
    T: HttpError + Send + Sync + 'static,
{
    fn status_code(&self) -> StatusCode {
        self.current_context().status_code()
    }

    fn error_kind(&self) -> &'static str {
        self.current_context().error_kind()
    }

    fn error_detail(&self) -> Option<ErrorDetail> {
        self.current_context().error_detail()
    }

    fn response_tuple(&self) -> (StatusCode, ErrorResponseData) {
        let code = self.status_code();
        if code.is_server_error() {
            // The full chain only goes to the log, never to the client.
            event!(Level::ERROR, report=?self);
        }

        (
            code,
            ErrorResponseData::new(
                self.error_kind(),
                self.current_context().to_string(),
                self.error_detail(),
            ),
        )
    }
}

/// A body to be returned in an error response. The `error` member is a readable message so
/// that browser clients can display it as-is.
#[derive(Debug, Serialize)]
pub struct ErrorResponseData {
    error: Cow<'static, str>,
    kind: Cow<'static, str>,
    #[serde(flatten)]
    details: Option<ErrorDetail>,
}

impl ErrorResponseData {
    /// Create a new [ErrorResponseData] with the given error code and message.
    pub fn new(
        kind: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
        details: Option<ErrorDetail>,
    ) -> ErrorResponseData {
        ErrorResponseData {
            error: message.into(),
            kind: kind.into(),
            details,
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.error
    }
}

/// Wraps an error_stack::Report and implements IntoResponse, allowing easy return of a Report<T>
/// from an Axum endpoint.
pub struct WrapReport<T: HttpError + Sync + Send + 'static>(pub error_stack::Report<T>);

impl<T: HttpError + Sync + Send + 'static> IntoResponse for WrapReport<T> {
    fn into_response(self) -> Response {
        self.0.to_response()
    }
}

impl<T: HttpError + Sync + Send + 'static> From<Report<T>> for WrapReport<T> {
    fn from(value: Report<T>) -> Self {
        WrapReport(value)
    }
}

impl<T: HttpError + std::error::Error + Sync + Send + 'static> From<T> for WrapReport<T> {
    fn from(value: T) -> Self {
        WrapReport(Report::from(value))
    }
}

impl<T: HttpError + Sync + Send + 'static> Deref for WrapReport<T> {
    type Target = error_stack::Report<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: HttpError + Sync + Send + 'static> Debug for WrapReport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}
