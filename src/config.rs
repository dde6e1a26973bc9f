use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;
use tokio::time::Duration;

use crate::address::ServerAddress;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PingerConfig {
    pub servers: Vec<String>,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default)]
    pub enable_latency_history: bool,
}

fn default_ping_interval_ms() -> u64 {
    2000
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9100
}

impl PingerConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        let config: PingerConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.servers.iter().all(|s| s.trim().is_empty()) {
            return Err(anyhow::anyhow!("No servers configured"));
        }
        if self.ping_interval_ms == 0 {
            return Err(anyhow::anyhow!("ping_interval_ms must be positive"));
        }
        self.get_tracing_level().map(|_| ())
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!(
                "Invalid log level: {}. Valid levels are: trace, debug, info, warn, error",
                self.log_level
            )),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed server addresses. Entries that fail to parse are skipped.
    pub fn targets(&self) -> Vec<ServerAddress> {
        self.servers
            .iter()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match ServerAddress::parse(line) {
                Ok(address) => Some(address),
                Err(e) => {
                    tracing::warn!("Skipping server: {}", e);
                    None
                }
            })
            .collect()
    }
}

pub struct ConfigManager {
    pub config: Arc<RwLock<PingerConfig>>,
}

impl ConfigManager {
    pub async fn start() -> Result<Self> {
        let config_file = std::env::var("PINGER_CONFIG").unwrap_or_else(|_| "servers.json".to_string());

        println!("Starting with config file: {}", config_file);

        let initial = Self::load_file_config(&config_file).await?;
        let config = Arc::new(RwLock::new(initial));

        let poll_interval_sec: u64 = std::env::var("CONFIG_POLL_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        // Spawn background task to watch file for changes
        {
            let config_clone = config.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(poll_interval_sec)).await;
                    Self::reload(&config_clone, &config_file).await;
                }
            });
        }

        Ok(ConfigManager { config })
    }

    async fn reload(config: &RwLock<PingerConfig>, config_file: &str) {
        match Self::load_file_config(config_file).await {
            Ok(new_cfg) => {
                let mut c = config.write().await;
                if *c != new_cfg {
                    tracing::info!("Config file updated");
                    *c = new_cfg;
                }
            }
            Err(e) => {
                tracing::error!("Error reading config file {}: {:?}", config_file, e);
            }
        }
    }

    pub async fn load_file_config(file_path: &str) -> Result<PingerConfig> {
        if !Path::new(file_path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path));
        }

        let content = fs::read_to_string(file_path).await?;
        PingerConfig::from_json(&content)
    }
}
