use andy_ai::api;
use andy_ai::config::Config;
use andy_ai::database::SqliteDatabase;
use andy_ai::errors::Result;
use andy_ai::state::AppState;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().flatten_event(true))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        tracing::error!(action = "startup_failed", error = %e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env()?;
    let db = SqliteDatabase::connect(&config.database_url, config.database_max_connections).await?;
    let state = AppState::with_http_clients(config, db)?;

    if state.config.seed_test_user {
        state.users.seed_test_user().await?;
    }
    if state.config.openai.api_key.is_none() {
        tracing::warn!(action = "openai_unconfigured", "OPENAI_API_KEY is not set; assistant endpoints will fail");
    }

    api::start_http_server(state).await
}
