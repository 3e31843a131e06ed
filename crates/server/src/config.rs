//! Server configuration

use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: String,

    /// Server port
    pub port: u16,

    /// Root directory holding one subdirectory per dataset
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("blindfeed-data"),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BLINDFEED_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("BLINDFEED_PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        if let Ok(dir) = std::env::var("BLINDFEED_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    /// Get the full bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
