use chrono::Duration;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tv_catalog::{
    auth::issue_token,
    database::{connect, run_migration},
};

#[derive(Parser)]
#[command(name = "tv-catalog")]
#[command(about = "Administrative commands for the TV show catalog", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Creates the catalog tables if they do not exist yet.
    Migrate {
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./db/database.db")]
        database_url: String,
    },

    /// Prints a bearer token for local development.
    Token {
        #[arg(short, long, help = "User id to put in the token")]
        user: i64,

        #[arg(long, help = "Grant administrator rights")]
        admin: bool,

        #[arg(long, default_value_t = 24, help = "Hours until the token expires")]
        hours: i64,

        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
}

fn token_ttl(hours: i64) -> Result<Duration, String> {
    Duration::try_hours(hours).ok_or_else(|| format!("--hours {hours} is out of range"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tv_catalog=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate { database_url } => {
            let pool = connect(&database_url, 1).await?;
            run_migration(&pool).await?;

            tracing::info!(%database_url, "migration applied");
        }
        Commands::Token {
            user,
            admin,
            hours,
            secret,
        } => {
            let token = issue_token(user, admin, &secret, token_ttl(hours)?)?;

            println!("{token}");
        }
    }

    Ok(())
}
