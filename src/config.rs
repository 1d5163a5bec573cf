use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::LedgerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Issuer key used to sign block hashes; blocks stay unsigned without it
    pub signing_key_path: Option<PathBuf>,
    pub explorer_limit: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, LedgerError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://evidence-ledger.db".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|e| LedgerError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

        let signing_key_path = env::var("SIGNING_KEY_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let explorer_limit = env::var("EXPLORER_LIMIT")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|e| LedgerError::Config(format!("Invalid EXPLORER_LIMIT: {}", e)))?;

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            signing_key_path,
            explorer_limit,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://evidence-ledger.db".to_string(),
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            signing_key_path: None,
            explorer_limit: 20,
        }
    }
}
