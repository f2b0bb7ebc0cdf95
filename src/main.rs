use messaging_core::{
    config::Config,
    error::AppError,
    logging,
    realtime::fanout::{EventBus, RedisEventBus},
    repository::MemoryStore,
    state::AppState,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env()?);

    let bus: Arc<dyn EventBus> = Arc::new(RedisEventBus::new(&cfg.redis_url)?);

    // The persistence collaborator is injected by the embedding application;
    // the standalone binary runs on the in-memory store.
    let store = MemoryStore::new();
    let state = AppState::new(
        cfg.clone(),
        Arc::new(store.clone()),
        Arc::new(store),
        bus,
    );

    let _listener = state.fanout.start_listener().await?;
    tracing::info!(instance = %cfg.instance_name, "messaging-core running");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::Config(format!("signal handler: {e}")))?;
    tracing::info!("shutting down");
    Ok(())
}
