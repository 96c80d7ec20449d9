use axum::{extract::State, http::StatusCode, response::IntoResponse, routing};
use error_stack::{Report, ResultExt};
use listmate_web::{auth::password, extract::Json, Message};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;
use tracing::{event, Level};

use super::Authed;
use crate::{
    error::HandlerError,
    models::user::{queries, User},
    server::ServerState,
    Error,
};

#[derive(Deserialize, Debug, Default)]
pub struct UsernameAndPassword {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl UsernameAndPassword {
    /// Return the username and password, requiring both to be present and non-empty.
    fn required(self) -> Result<(String, String), Error> {
        match (self.username, self.password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Ok((username, password))
            }
            _ => Err(Error::MissingCredentials),
        }
    }
}

#[derive(Serialize, Debug)]
struct AuthResponse {
    message: &'static str,
    user: User,
}

async fn start_session(state: &ServerState, cookies: &Cookies, user: &User) -> Result<(), Report<Error>> {
    state
        .sessions
        .create_session(cookies, user.id, &user.username)
        .await
        .change_context(Error::AuthSubsystem)?;
    Ok(())
}

async fn register(
    State(state): State<ServerState>,
    cookies: Cookies,
    Json(body): Json<UsernameAndPassword>,
) -> Result<impl IntoResponse, HandlerError> {
    let (username, password) = body.required()?;

    if queries::username_exists(&state.db, &username).await? {
        return Err(Error::UsernameTaken.into());
    }

    let password_hash = password::new_hash(password)
        .await
        .change_context(Error::AuthSubsystem)?;
    let user = queries::create(&state.db, &username, &password_hash).await?;
    start_session(&state, &cookies, &user).await?;

    event!(Level::INFO, user_id=%user.id, "registered user");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful",
            user,
        }),
    ))
}

async fn login(
    State(state): State<ServerState>,
    cookies: Cookies,
    Json(body): Json<UsernameAndPassword>,
) -> Result<impl IntoResponse, HandlerError> {
    let (username, password) = body.required()?;

    let creds = queries::get_credentials(&state.db, &username)
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if let Err(e) = password::verify_password(password, creds.password_hash).await {
        if e.is_unauthenticated() {
            return Err(Error::InvalidCredentials.into());
        }

        return Err(Report::new(e).change_context(Error::AuthSubsystem).into());
    }

    let user = User {
        id: creds.id,
        username: creds.username,
    };
    start_session(&state, &cookies, &user).await?;

    Ok(Json(AuthResponse {
        message: "Login successful",
        user,
    }))
}

async fn logout(
    State(state): State<ServerState>,
    cookies: Cookies,
) -> Result<impl IntoResponse, HandlerError> {
    state
        .sessions
        .delete_session(&cookies)
        .await
        .change_context(Error::AuthSubsystem)?;

    Ok(Json(Message::new("Logged out successfully")))
}

async fn me(auth: Authed) -> impl IntoResponse {
    Json(User {
        id: auth.user_id,
        username: auth.username.clone(),
    })
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/api/auth/register", routing::post(register))
        .route("/api/auth/login", routing::post(login))
        .route("/api/auth/logout", routing::post(logout))
        .route("/api/auth/me", routing::get(me))
}

#[cfg(test)]
mod test {
    use listmate_web::testing::ResponseExt;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::tests::{start_app, BootstrappedData};

    #[test]
    fn credentials_must_be_present() {
        let missing = UsernameAndPassword {
            username: Some("alice".into()),
            password: None,
        };
        assert!(matches!(missing.required(), Err(Error::MissingCredentials)));

        let empty = UsernameAndPassword {
            username: Some(String::new()),
            password: Some("pw".into()),
        };
        assert!(matches!(empty.required(), Err(Error::MissingCredentials)));

        let ok = UsernameAndPassword {
            username: Some("alice".into()),
            password: Some("pw".into()),
        };
        assert_eq!(ok.required().unwrap(), ("alice".to_string(), "pw".to_string()));
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "test_db"), ignore = "requires a database")]
    async fn register_login_and_logout(db: sqlx::PgPool) {
        let (app, _) = start_app(db).await;
        let client = &app.client;

        let response = client
            .post("api/auth/register")
            .json(&json!({ "username": "carol", "password": "hunter2" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Registration successful");
        assert_eq!(body["user"]["username"], "carol");

        // Registration logs the user in
        let me: serde_json::Value = client
            .get("api/auth/me")
            .send()
            .await
            .unwrap()
            .log_error()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(me["username"], "carol");
        assert_eq!(me["id"], body["user"]["id"]);

        let response: serde_json::Value = client
            .post("api/auth/logout")
            .send()
            .await
            .unwrap()
            .log_error()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["message"], "Logged out successfully");

        let (status, message) = client.get("api/auth/me").send().await.unwrap().error_message().await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "Session should be gone after logout");
        assert_eq!(message, "Unauthorized");

        let response: serde_json::Value = client
            .post("api/auth/login")
            .json(&json!({ "username": "carol", "password": "hunter2" }))
            .send()
            .await
            .unwrap()
            .log_error()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["message"], "Login successful");
        assert_eq!(response["user"]["username"], "carol");
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "test_db"), ignore = "requires a database")]
    async fn register_rejects_bad_input(db: sqlx::PgPool) {
        let (app, BootstrappedData { owner, .. }) = start_app(db).await;
        let client = app.client.fresh();

        let (status, message) = client
            .post("api/auth/register")
            .json(&json!({ "username": "dave" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Missing username or password");

        let (status, message) = client
            .post("api/auth/register")
            .json(&json!({ "username": owner.username, "password": "whatever" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Username already exists");
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "test_db"), ignore = "requires a database")]
    async fn login_failures(db: sqlx::PgPool) {
        let (app, BootstrappedData { owner, .. }) = start_app(db).await;
        let client = app.client.fresh();

        let (status, message) = client
            .post("api/auth/login")
            .json(&json!({ "username": owner.username, "password": "wrong" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Invalid username or password");

        let (status, message) = client
            .post("api/auth/login")
            .json(&json!({ "username": "nobody", "password": "wrong" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Invalid username or password");

        let (status, _) = client
            .post("api/auth/login")
            .json(&json!({ "password": "wrong" }))
            .send()
            .await
            .unwrap()
            .error_message()
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[cfg_attr(not(feature = "test_db"), ignore = "requires a database")]
    async fn logout_without_session(db: sqlx::PgPool) {
        let (app, _) = start_app(db).await;
        let response = app.client.fresh().post("api/auth/logout").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
