pub mod queries;

pub use listmate_web::auth::UserId;
use serde::Serialize;

/// A user as shown to other users
#[derive(Serialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// The fields needed to check a user's password
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentials {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
}
