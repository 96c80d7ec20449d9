use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use error_stack::{Report, ResultExt};
use listmate::{db, server, Error};
use listmate_web::tracing_config::configure_tracing;
use tracing::{event, Level};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Database management
    Db(db::DbCommand),
    /// Run the HTTP server
    Serve(ServeCommand),
}

#[derive(Args, Debug)]
struct ServeCommand {
    /// The PostgreSQL database to connect to
    #[clap(long = "db", env = "DATABASE_URL")]
    database_url: String,

    /// The maximum number of database connections to keep open
    #[clap(long, env = "DB_MAX_CONNECTIONS", default_value_t = 10)]
    db_max_connections: u32,

    /// The IP host to bind to
    #[clap(long, env = "HOST", default_value_t = String::from("127.0.0.1"))]
    host: String,

    /// The TCP port to listen on
    #[clap(long, env = "PORT", default_value_t = 4000)]
    port: u16,

    /// The environment in which this server is running
    #[clap(long = "env", env = "ENV", default_value_t = String::from("development"))]
    env: String,

    /// Request timeout, in seconds
    #[clap(long, env = "REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// The secret used to sign session cookies
    #[clap(long, env = "SESSION_SECRET", hide_env_values = true)]
    session_secret: String,

    /// How long a session lasts without being used, in hours
    #[clap(long, env = "SESSION_EXPIRY", default_value_t = 24)]
    session_expiry: u64,

    /// The origin of the browser client. When set, cross-origin requests with credentials are
    /// allowed from this origin.
    #[clap(long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,
}

async fn serve(cmd: ServeCommand) -> Result<(), Report<Error>> {
    let pg_pool = db::connect(&cmd.database_url, cmd.db_max_connections).await?;

    let server = server::create_server(server::Config {
        env: cmd.env,
        host: cmd.host,
        port: cmd.port,
        request_timeout: Duration::from_secs(cmd.request_timeout),
        pg_pool,
        session_secret: cmd.session_secret,
        session_expiry: Duration::from_secs(cmd.session_expiry * 60 * 60),
        frontend_url: cmd.frontend_url,
    })
    .await?;

    server.run().await?;

    event!(Level::INFO, "Server shut down");

    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
pub async fn main() -> Result<(), Report<Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    configure_tracing(
        "",
        tracing_subscriber::fmt::time::ChronoUtc::rfc_3339(),
        std::io::stdout,
    )
    .change_context(Error::ServerStart)?;

    match cli.command {
        Command::Db(cmd) => cmd.handle().await,
        Command::Serve(cmd) => serve(cmd).await,
    }
}
