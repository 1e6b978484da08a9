use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use dribdat::{config::Config, database::Database, remote::HttpRemoteSource};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Database file; defaults to DATABASE_URL or the environment's default
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations
    Migrate,
    /// Pull README data into autoupdating projects
    Sync,
    /// Make a user an active administrator
    Promote { username: String },
    /// Delete expired sessions
    PruneSessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let database_url = match args.database {
        Some(path) => path,
        None => Config::load()?.database_url,
    };
    let db = Database::open(&database_url)?;

    match args.command {
        Command::Migrate => {
            dribdat_process::migrate(&db).await?;
        }
        Command::Sync => {
            dribdat_process::sync_projects(&db, &HttpRemoteSource::new()).await?;
        }
        Command::Promote { username } => {
            dribdat_process::promote(&db, &username).await?;
        }
        Command::PruneSessions => {
            dribdat_process::prune_sessions(&db).await?;
        }
    }
    Ok(())
}
