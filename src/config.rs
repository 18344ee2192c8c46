use std::env;

use anyhow::{Context, Result};
use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub stripe_secret_key: String,
    pub stripe_api_url: Option<String>,
    pub webhook_secret: String,
    /// When set, orders persist to this JSON file instead of process memory.
    pub orders_file: Option<String>,
    pub gateway_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")
                .context("STRIPE_SECRET_KEY is required")?,
            stripe_api_url: env::var("STRIPE_API_URL").ok(),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .context("STRIPE_WEBHOOK_SECRET is required")?,
            orders_file: env::var("ORDERS_FILE").ok(),
            gateway_timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("GATEWAY_TIMEOUT_SECS must be a number of seconds")?,
        })
    }
}
