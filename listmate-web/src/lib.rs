#![warn(missing_docs)]
//! Reusable web plumbing for the Listmate server

use std::borrow::Cow;

use serde::Serialize;

/// Authentication and sessions
pub mod auth;
/// Error handling
pub mod errors;
/// Request extractors that reject with JSON error bodies
pub mod extract;
/// Integer-backed ID newtypes
pub mod id;
/// Utilities for running an HTTP server
pub mod server;
/// Utilities for working with SQL queries
pub mod sql;
/// Functionality to help test your app
pub mod testing;
/// Tracing configuration
pub mod tracing_config;

#[doc(hidden)]
pub use sqlx;

/// A simple structure for sending back a message-only response
#[derive(Serialize, Debug)]
pub struct Message<'a> {
    message: Cow<'a, str>,
}

impl<'a> Message<'a> {
    /// Create a new Message with the given text.
    pub fn new(message: impl Into<Cow<'a, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
