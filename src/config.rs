use std::env;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_ssl: bool,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub admin_password: String,
    pub user_token_ttl_hours: i64,
    pub admin_token_ttl_hours: i64,
    pub reservation_token_ttl_minutes: i64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let admin_password = env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD must be set")?;
        if jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3001".to_string());

        Ok(Self {
            database_url,
            database_ssl: env_or("DB_SSL", false),
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            bind_addr,
            jwt_secret,
            admin_password,
            user_token_ttl_hours: env_or("USER_TOKEN_TTL_HOURS", 24),
            admin_token_ttl_hours: env_or("ADMIN_TOKEN_TTL_HOURS", 12),
            reservation_token_ttl_minutes: env_or("RESERVATION_TOKEN_TTL_MINUTES", 60),
        })
    }
}
