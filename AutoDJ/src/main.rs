use adjcache::TrackCacheConfigExt;
use adjconfig::get_config;
use adjmedia::{MediaFetcher, MediaToolsConfigExt, Transcoder};
use adjrelay::{RelayConfigExt, RelayEngine, RelaySettings, SharedState, StatusSnapshot};
use axum::{Json, Router, extract::State, routing::get};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ========== PHASE 1 : Configuration & logs ==========

    let config = get_config();
    let min_level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(min_level.to_lowercase())),
        )
        .init();

    info!("🎚️ AutoDJ starting...");

    // ========== PHASE 2 : Outils externes & cache ==========

    info!("🛠️ Preparing external tools...");
    let fetcher: Arc<dyn MediaFetcher> = Arc::new(config.create_fetcher());
    let transcoder: Arc<dyn Transcoder> = Arc::new(config.create_transcoder());

    info!("💾 Opening track cache...");
    let cache = config.create_track_cache(
        fetcher.clone(),
        transcoder.clone(),
        config.get_ingest_bitrate(),
    )?;

    // ========== PHASE 3 : Moteur de relais ==========

    let settings = RelaySettings::from_config(&config)?;
    info!(mount = %settings.mount, "📻 Starting continuous relay engine...");
    let mut engine = RelayEngine::new(settings, fetcher, transcoder, cache);
    engine.start().await?;

    // ========== PHASE 4 : Point de statut HTTP ==========

    let status_port = config.get_status_port();
    let app = Router::new()
        .route("/status", get(status_handler))
        .with_state(engine.state());
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", status_port)).await?;
    info!("🌐 Status endpoint ready at http://0.0.0.0:{}/status", status_port);

    let server_token = engine.cancellation_token();
    tokio::spawn(async move {
        let shutdown = async move { server_token.cancelled().await };
        if let Err(err) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            warn!("⚠️ Status server error: {}", err);
        }
    });

    info!("✅ AutoDJ is on air!");
    info!("Press Ctrl+C to stop...");

    // Attendre Ctrl+C, ou l'arrêt spontané du moteur (erreur fatale)
    let engine_token = engine.cancellation_token();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("🛑 Ctrl+C received, shutting down..."),
        _ = engine_token.cancelled() => warn!("🛑 Engine stopped on its own, shutting down..."),
    }

    engine.shutdown().await;
    info!("👋 AutoDJ stopped");
    Ok(())
}

/// Photographie de l'état du moteur pour le consommateur externe
async fn status_handler(State(state): State<SharedState>) -> Json<StatusSnapshot> {
    Json(state.snapshot())
}
