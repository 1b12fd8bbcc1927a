use std::{env, net::SocketAddr};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub token_secret: String,
    pub cors_allow_origin: String,
    pub invoice_prefix: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://tripsheet.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let token_secret = env::var("TOKEN_SECRET")
            .unwrap_or_else(|_| "change-me-super-secret-token-key".to_string());

        // "*" opens the API to any origin, which is what the dev client wants.
        let cors_allow_origin = env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".to_string());

        let invoice_prefix = env::var("INVOICE_PREFIX").unwrap_or_else(|_| "STINV".to_string());

        Ok(Self {
            database_url,
            listen_addr,
            token_secret,
            cors_allow_origin,
            invoice_prefix,
        })
    }
}
