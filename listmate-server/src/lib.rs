pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod realtime;
pub mod server;

#[cfg(test)]
mod tests;

pub use error::Error;
