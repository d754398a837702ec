mod accounts;
mod api;
mod auth;
mod catalog;
mod config;
mod db;
mod entities;
mod error;
mod listing;
mod models;
mod mutator;
mod rating;
mod routes;
mod templates;
#[cfg(test)]
mod test_helpers;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{accounts::Accounts, catalog::CatalogStore, config::Config, mutator::Mutator};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: CatalogStore,
    pub mutator: Mutator,
    pub accounts: Accounts,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection) -> Self {
        Self {
            catalog: CatalogStore::new(db.clone()),
            mutator: Mutator::new(db.clone()),
            accounts: Accounts::new(db, config.session_ttl_days),
            config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,marquee=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(config.database_url.as_str()).await?;
    let state = Arc::new(AppState::new(config.clone(), db));
    if config.seed_demo {
        state.catalog.seed_demo().await?;
    }

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, page_size = config.page_size, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
