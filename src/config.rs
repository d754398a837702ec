use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub page_size: usize,
    pub session_ttl_days: i64,
    pub cookie_secure: bool,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://marquee.db?mode=rwc".to_string());

        let page_size: usize =
            std::env::var("PAGE_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(12);

        let session_ttl_days: i64 =
            std::env::var("SESSION_TTL_DAYS").ok().and_then(|s| s.parse().ok()).unwrap_or(14);

        let cookie_secure = env_flag("COOKIE_SECURE");
        let seed_demo = env_flag("SEED_DEMO");

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            page_size: page_size.max(1),
            session_ttl_days: session_ttl_days.max(1),
            cookie_secure,
            seed_demo,
        })
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|s| matches!(s.trim(), "1" | "true" | "yes")).unwrap_or(false)
}
