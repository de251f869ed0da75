use std::sync::Arc;

use chat_service::config::Config;
use chat_service::db;
use chat_service::error::AppError;
use chat_service::logging;
use chat_service::routes::build_router;
use chat_service::state::AppState;
use chat_service::websocket::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Config::from_env()?;
    let port = config.port;

    let db = db::init_pool(&config.database_url).await?;
    db::MIGRATOR
        .run(&db)
        .await
        .map_err(|e| AppError::StartServer(format!("migrations failed: {e}")))?;
    tracing::info!("database ready");

    let state = AppState {
        db,
        registry: ConnectionRegistry::new(),
        config: Arc::new(config),
    };

    let router = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::StartServer(format!("failed to bind {addr}: {e}")))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;

    Ok(())
}
