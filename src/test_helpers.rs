//! Shared fixtures for store and router tests.

use jiff::civil::date;
use sea_orm::{ActiveModelTrait, ConnectOptions, DatabaseConnection, Set};

use crate::{
    AppState,
    catalog::CatalogStore,
    config::Config,
    db::{connect_and_migrate, now_sec},
    entities::{movie, user},
    models::NewMovie,
};

/// Fresh migrated database. One pooled connection so every query sees the same
/// in-memory file.
pub async fn memory_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    connect_and_migrate(opts).await.expect("in-memory database")
}

pub fn new_movie(title: &str, genre_id: i32) -> NewMovie {
    NewMovie {
        title: title.to_string(),
        description: format!("{title}, a film"),
        release_date: date(2021, 6, 1),
        duration: Some(110),
        genre_id,
        featured: false,
    }
}

/// Inserts a movie under a "Drama" genre, creating the genre on first use.
pub async fn seed_movie(db: &DatabaseConnection, title: &str) -> movie::Model {
    let store = CatalogStore::new(db.clone());
    let genre = match store.genres().await.unwrap().into_iter().find(|g| g.name == "Drama") {
        Some(g) => g,
        None => store.create_genre("Drama").await.unwrap(),
    };
    store.create_movie(new_movie(title, genre.id)).await.unwrap()
}

/// Inserts a user directly, skipping password hashing.
pub async fn register_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::ActiveModel {
        id: Default::default(),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        password_hash: Set("not-a-hash".to_string()),
        created_at: Set(now_sec()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn test_state(db: DatabaseConnection) -> AppState {
    let config = Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        page_size: 20,
        session_ttl_days: 14,
        cookie_secure: false,
        seed_demo: false,
    };
    AppState::new(std::sync::Arc::new(config), db)
}
