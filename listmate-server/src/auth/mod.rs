pub mod endpoints;
pub mod permissions;

pub use listmate_web::auth::{AuthInfo, Authed};
