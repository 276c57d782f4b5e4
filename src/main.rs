use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use chat_snapshot_api::{
    config::Config,
    api::routes::create_router,
    snapshot::{HttpSnapshotApi, SnapshotJobClient},
    store::ResultStore,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_snapshot_api=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let server_addr = config.server_addr;
    tracing::info!(
        provider = %config.provider_base_url,
        dataset_id = %config.dataset_id,
        poll_interval = ?config.poll.interval,
        poll_timeout = ?config.poll.timeout,
        "Configuration loaded"
    );

    let store = ResultStore::connect(&config.database_url).await?;
    tracing::info!("Database ready");

    let api = HttpSnapshotApi::new(&config.provider_base_url, &config.provider_token)?;
    let mut snapshots = SnapshotJobClient::new(Arc::new(api), config.poll.clone());
    if let Some(path) = &config.snapshot_output_file {
        snapshots = snapshots.with_output_file(path);
    }

    let app_state = AppState {
        config: Arc::new(config),
        snapshots,
        store,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(server_addr).await?;

    tracing::info!("Listening on {}", server_addr);
    axum::serve(listener, app).await?;

    tracing::info!("Server shut down");
    Ok(())
}
