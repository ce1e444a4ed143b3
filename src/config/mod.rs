use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

use crate::address::WalletAddress;

/// Hard ceiling on referral tree depth, whatever the configuration says.
pub const MAX_TREE_DEPTH: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub referral: ReferralConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("PROLINK_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("PROLINK_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    #[cfg(test)]
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()
            .context("Failed to parse API configuration")?
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(anyhow!("Database URL must be specified"));
        }
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than zero"));
        }
        if self.database.max_connections < self.database.min_connections.unwrap_or(1) {
            return Err(anyhow!("Max connections must be >= min connections"));
        }
        self.chain.ensure_bounds()?;
        self.referral.ensure_bounds()?;
        self.cache.ensure_bounds()?;
        self.events.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub request_timeout_ms: Option<u64>,
    #[serde(default = "ChainConfig::default_node_signature")]
    pub node_signature: String,
    #[serde(default = "ChainConfig::default_referral_reward_signature")]
    pub referral_reward_signature: String,
    #[serde(default = "ChainConfig::default_balanced_game_reward_signature")]
    pub balanced_game_reward_signature: String,
    #[serde(default = "ChainConfig::default_unbalanced_game_reward_signature")]
    pub unbalanced_game_reward_signature: String,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        let millis = self.request_timeout_ms.unwrap_or(3_000);
        assert!(millis >= 100, "RPC timeout must be at least 100ms");
        assert!(millis <= 60_000, "RPC timeout cannot exceed 60 seconds");
        Duration::from_millis(millis)
    }

    pub fn contract(&self) -> Result<WalletAddress> {
        let address = WalletAddress::parse(&self.contract_address)
            .with_context(|| format!("Invalid contract address {}", self.contract_address))?;
        if address.is_zero() {
            return Err(anyhow!("Contract address cannot be the zero address"));
        }
        Ok(address)
    }

    fn ensure_bounds(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(anyhow!("Chain RPC URL must be specified"));
        }
        if let Some(millis) = self.request_timeout_ms {
            if !(100..=60_000).contains(&millis) {
                return Err(anyhow!("RPC timeout must be between 100ms and 60s"));
            }
        }
        self.contract()?;
        for signature in [
            &self.node_signature,
            &self.referral_reward_signature,
            &self.balanced_game_reward_signature,
            &self.unbalanced_game_reward_signature,
        ] {
            if !signature.ends_with("(address)") {
                return Err(anyhow!(
                    "Contract signature {signature} must take a single address"
                ));
            }
        }
        Ok(())
    }

    fn default_node_signature() -> String {
        "getNode(address)".to_string()
    }

    fn default_referral_reward_signature() -> String {
        "referralRewards(address)".to_string()
    }

    fn default_balanced_game_reward_signature() -> String {
        "balancedGameRewards(address)".to_string()
    }

    fn default_unbalanced_game_reward_signature() -> String {
        "unbalancedGameRewards(address)".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferralConfig {
    #[serde(default = "ReferralConfig::default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "ReferralConfig::default_build_budget_ms")]
    pub build_budget_ms: u64,
    #[serde(default = "ReferralConfig::default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::default_max_depth(),
            build_budget_ms: Self::default_build_budget_ms(),
            fetch_concurrency: Self::default_fetch_concurrency(),
        }
    }
}

impl ReferralConfig {
    pub fn build_budget(&self) -> Duration {
        assert!(self.build_budget_ms >= 100, "Tree budget must be >= 100ms");
        Duration::from_millis(self.build_budget_ms)
    }

    fn ensure_bounds(&self) -> Result<()> {
        if self.max_depth > MAX_TREE_DEPTH {
            return Err(anyhow!(
                "Referral max_depth {} exceeds hard limit {MAX_TREE_DEPTH}",
                self.max_depth
            ));
        }
        if !(100..=120_000).contains(&self.build_budget_ms) {
            return Err(anyhow!("Referral build budget must be between 100ms and 120s"));
        }
        if self.fetch_concurrency == 0 || self.fetch_concurrency > 64 {
            return Err(anyhow!("Referral fetch concurrency must be within 1..=64"));
        }
        Ok(())
    }

    const fn default_max_depth() -> u32 {
        MAX_TREE_DEPTH
    }

    const fn default_build_budget_ms() -> u64 {
        10_000
    }

    const fn default_fetch_concurrency() -> usize {
        8
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub profiles_max_capacity: u64,
    pub profiles_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        if self.profiles_max_capacity < 100 {
            return Err(anyhow!("Profile cache capacity must be at least 100"));
        }
        if self.profiles_ttl_seconds == 0 || self.profiles_ttl_seconds > 86_400 {
            return Err(anyhow!("Profile cache TTL must be within one day"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "EventsConfig::default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: Self::default_channel_capacity(),
        }
    }
}

impl EventsConfig {
    fn ensure_bounds(&self) -> Result<()> {
        if self.channel_capacity == 0 || self.channel_capacity > 65_536 {
            return Err(anyhow!("Event channel capacity must be within 1..=65536"));
        }
        Ok(())
    }

    const fn default_channel_capacity() -> usize {
        1_024
    }
}

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}
