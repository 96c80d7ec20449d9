use chrono::NaiveDate;
use error_stack::Report;
use futures::FutureExt;
use listmate_web::testing::{ResponseExt, TestClient, TEST_PASSWORD, TEST_PASSWORD_HASH};
use serde_json::json;

use crate::{
    models::{
        todo::{
            queries::{self as todo_queries, NewTodo},
            TodoId, TodoPriority, TodoStatus,
        },
        todo_list::{self, AccessPermission, TodoListId},
        user::UserId,
    },
    Error,
};

pub struct TestApp {
    /// Hold on to the shutdown signal so the server stays alive
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
    /// A client with no session
    pub client: TestClient,
    pub base_url: String,
    pub server_task: tokio::task::JoinHandle<Result<(), Report<Error>>>,
}

/// A user with a logged-in client
pub struct TestUser {
    pub user_id: UserId,
    pub username: String,
    pub client: TestClient,
    /// The `name=value` pair of the session cookie, for clients that can't share the cookie jar
    pub session_cookie: String,
}

/// `owner` owns `list_id`, on which `editor` holds an EDIT grant and `viewer` a VIEW grant.
/// `outsider` has no access. The list contains three todos:
///
/// | title       | due date   | status      | priority |
/// |-------------|------------|-------------|----------|
/// | Buy milk    | 2030-01-01 | NOT_STARTED | P0       |
/// | Fix sink    | 2030-02-01 | COMPLETED   | P1       |
/// | Paint fence |            | IN_PROGRESS | P2       |
pub struct BootstrappedData {
    pub owner: TestUser,
    pub editor: TestUser,
    pub viewer: TestUser,
    pub outsider: TestUser,
    pub list_id: TodoListId,
    pub todo_ids: Vec<TodoId>,
}

async fn insert_user(db: &sqlx::PgPool, username: &str) -> UserId {
    sqlx::query_scalar::<_, UserId>(
        "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING id",
    )
    .bind(username)
    .bind(TEST_PASSWORD_HASH)
    .fetch_one(db)
    .await
    .expect("Inserting user")
}

async fn grant(db: &sqlx::PgPool, list_id: TodoListId, user_id: UserId, permission: AccessPermission) {
    sqlx::query("INSERT INTO todo_list_access (list_id, user_id, permission) VALUES ($1, $2, $3)")
        .bind(list_id)
        .bind(user_id)
        .bind(permission)
        .execute(db)
        .await
        .expect("Granting access");
}

async fn login(app_client: &TestClient, user_id: UserId, username: &str) -> TestUser {
    let client = app_client.fresh();
    let response = client
        .post("api/auth/login")
        .json(&json!({ "username": username, "password": TEST_PASSWORD }))
        .send()
        .await
        .expect("Logging in")
        .log_error()
        .await
        .expect("Login failed");

    let session_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .expect("Login response sets a session cookie")
        .to_string();

    TestUser {
        user_id,
        username: username.to_string(),
        client,
        session_cookie,
    }
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

async fn bootstrap(db: &sqlx::PgPool, client: &TestClient) -> BootstrappedData {
    let owner_id = insert_user(db, "owner").await;
    let editor_id = insert_user(db, "editor").await;
    let viewer_id = insert_user(db, "viewer").await;
    let outsider_id = insert_user(db, "outsider").await;

    let list = todo_list::queries::create(db, owner_id, "Chores", "Around the house")
        .await
        .expect("Creating list");
    grant(db, list.id, editor_id, AccessPermission::Edit).await;
    grant(db, list.id, viewer_id, AccessPermission::View).await;

    let todos = [
        ("Buy milk", date(2030, 1, 1), TodoStatus::NotStarted, TodoPriority::P0),
        ("Fix sink", date(2030, 2, 1), TodoStatus::Completed, TodoPriority::P1),
        ("Paint fence", None, TodoStatus::InProgress, TodoPriority::P2),
    ];

    let mut todo_ids = Vec::with_capacity(todos.len());
    for (title, due_date, status, priority) in todos {
        let todo = todo_queries::create(
            db,
            list.id,
            &NewTodo {
                title: title.to_string(),
                description: String::new(),
                due_date,
                status,
                priority,
            },
        )
        .await
        .expect("Creating todo");
        todo_ids.push(todo.id);
    }

    let (owner, editor, viewer, outsider) = tokio::join!(
        login(client, owner_id, "owner"),
        login(client, editor_id, "editor"),
        login(client, viewer_id, "viewer"),
        login(client, outsider_id, "outsider"),
    );

    BootstrappedData {
        owner,
        editor,
        viewer,
        outsider,
        list_id: list.id,
        todo_ids,
    }
}

/// Start a server on a random port against the test database, and fill it with a standard
/// set of users and todos.
pub async fn start_app(pg_pool: sqlx::PgPool) -> (TestApp, BootstrappedData) {
    listmate_web::tracing_config::test::init();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    // Make the shutdown future resolve to () so the type matches what Axum expects.
    let shutdown_rx = shutdown_rx.map(|_| ());

    let config = crate::server::Config {
        env: "test".into(),
        host: "127.0.0.1".into(),
        port: 0, // Bind to random port
        request_timeout: std::time::Duration::from_secs(30),
        pg_pool: pg_pool.clone(),
        session_secret: "test-session-secret".into(),
        session_expiry: std::time::Duration::from_secs(24 * 60 * 60),
        frontend_url: None,
    };

    let server = crate::server::create_server(config)
        .await
        .expect("creating server");

    let base_url = format!("http://{}:{}", server.host, server.port);
    let test_client = TestClient::new(base_url.clone());

    let server_task = tokio::task::spawn(server.run_with_shutdown_signal(shutdown_rx));

    let data = bootstrap(&pg_pool, &test_client).await;

    let app = TestApp {
        _shutdown_tx: shutdown_tx,
        client: test_client,
        base_url,
        server_task,
    };

    (app, data)
}
