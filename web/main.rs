mod auth;
mod config;
mod show;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use config::AppConfig;
use std::sync::Arc;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tv_catalog::{
    database::{Database, connect},
    storage::Storage,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub storage: Arc<Storage>,
    pub config: Arc<AppConfig>,
}

/// Builds the router. Everything the handlers need comes in through `state`.
pub fn app(state: AppState) -> Router {
    let images = ServeDir::new(&state.config.image_dir);
    let body_limit = state.config.max_upload_bytes;
    let timeout = state.config.request_timeout;

    Router::new()
        .route("/tv", get(show::list_shows).post(show::post_show))
        .route(
            "/tv/{id}",
            get(show::get_show)
                .patch(show::patch_show)
                .delete(show::delete_show),
        )
        .nest_service("/images", images)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tv_catalog=debug,web=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let pool = connect(&config.database_url, config.database_max_connections).await?;
    let db = Database::with_migration(pool).await?;
    let storage = Storage::new(config.image_dir.clone(), config.image_base_url.clone());

    let addr = config.bind_addr()?;
    let state = AppState {
        db: Arc::new(db),
        storage: Arc::new(storage),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
}
