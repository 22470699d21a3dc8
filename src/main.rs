use tally_api::config;
use tally_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up DATABASE_URL, TALLY_* overrides from .env in development.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_api=info,tower_http=info".into()),
        )
        .init();

    let config = config::config();
    tracing::info!(environment = ?config.environment, "starting tally-api");

    let pool = tally_api::database::pool::connect().await?;
    let state = AppState::for_pool(pool);
    let app = tally_api::app(state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, base_domain = %config.tenancy.base_domain, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
