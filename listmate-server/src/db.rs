use clap::{Args, Subcommand};
use error_stack::{Report, ResultExt};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{event, instrument, Level};

use crate::Error;

/// Connect to the database, returning a connection pool.
#[instrument(skip(database_url))]
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, Report<Error>> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .change_context(Error::Db)
        .attach_printable("Connecting to database")?;

    event!(Level::INFO, max_connections, "Connected to database");
    Ok(pool)
}

/// Apply any migrations that have not yet run.
pub async fn run_migrations(db: &PgPool) -> Result<(), Report<Error>> {
    sqlx::migrate!().run(db).await.change_context(Error::Db)?;
    event!(Level::INFO, "Database migrations complete");
    Ok(())
}

#[derive(Args, Debug)]
pub struct DbCommand {
    /// The PostgreSQL database to connect to
    #[clap(long = "db", env = "DATABASE_URL")]
    database_url: String,

    #[clap(subcommand)]
    pub command: DbSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum DbSubcommand {
    /// Update the database with the latest migrations
    Migrate,
}

impl DbCommand {
    pub async fn handle(self) -> Result<(), Report<Error>> {
        let pg_pool = connect(&self.database_url, 1).await?;

        match self.command {
            DbSubcommand::Migrate => run_migrations(&pg_pool).await?,
        }

        Ok(())
    }
}
