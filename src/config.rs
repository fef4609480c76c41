//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::marketplace::MARKETPLACE_PROGRAM_STR;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub sniper: SniperConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(default = "default_marketplace_base_url")]
    pub base_url: String,
    #[serde(default = "default_marketplace_referer")]
    pub referer: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_marketplace_base_url(),
            referer: default_marketplace_referer(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SniperConfig {
    /// Collection to hunt, matched as a substring of listing titles
    #[serde(default)]
    pub collection_name: String,
    /// Maximum acceptable price in SOL
    #[serde(default)]
    pub price_ceiling_sol: f64,
    /// Watched marketplace program address
    #[serde(default = "default_program_address")]
    pub program_address: String,
    /// Pause between worker launches (rate-limit pacing)
    #[serde(default = "default_dispatch_delay_ms")]
    pub dispatch_delay_ms: u64,
    /// Cap on concurrent in-flight workers; excess dispatches queue
    #[serde(default = "default_max_concurrent_workers")]
    pub max_concurrent_workers: usize,
}

impl Default for SniperConfig {
    fn default() -> Self {
        Self {
            collection_name: String::new(),
            price_ceiling_sol: 0.0,
            program_address: default_program_address(),
            dispatch_delay_ms: default_dispatch_delay_ms(),
            max_concurrent_workers: default_max_concurrent_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Path to the signer keypair file (JSON byte array or base58 secret)
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyConfig {
    /// Inline `host:port:user:pass` entries
    #[serde(default)]
    pub entries: Vec<String>,
    /// Optional file with one entry per line; merged after `entries`
    #[serde(default)]
    pub file: Option<String>,
}

impl ProxyConfig {
    /// Collect inline entries plus file lines, skipping blanks and comments
    pub fn resolved_entries(&self) -> Result<Vec<String>> {
        let mut entries = self.entries.clone();

        if let Some(path) = &self.file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read proxy file {}", path))?;
            entries.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(String::from),
            );
        }

        Ok(entries)
    }
}

// Default value functions
fn default_rpc_endpoint() -> String {
    std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_marketplace_base_url() -> String {
    "https://api-mainnet.magiceden.io".into()
}

fn default_marketplace_referer() -> String {
    "https://magiceden.io/".into()
}

fn default_program_address() -> String {
    MARKETPLACE_PROGRAM_STR.into()
}

fn default_dispatch_delay_ms() -> u64 {
    10
}

fn default_max_concurrent_workers() -> usize {
    64
}

fn default_keypair_path() -> String {
    std::env::var("KEYPAIR_PATH").unwrap_or_else(|_| "credentials/keypair.json".into())
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SNIPER_)
            .add_source(
                config::Environment::with_prefix("SNIPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Operator-level misconfiguration fails here, before the race starts.
    fn validate(&self) -> Result<()> {
        if self.sniper.collection_name.is_empty() {
            anyhow::bail!("sniper.collection_name must be set");
        }

        if self.sniper.price_ceiling_sol <= 0.0 {
            anyhow::bail!("sniper.price_ceiling_sol must be positive");
        }

        if self.sniper.max_concurrent_workers == 0 {
            anyhow::bail!("sniper.max_concurrent_workers must be at least 1");
        }

        solana_sdk::pubkey::Pubkey::from_str(&self.sniper.program_address)
            .with_context(|| format!("Invalid program address: {}", self.sniper.program_address))?;

        if self.proxy.entries.is_empty() && self.proxy.file.is_none() {
            anyhow::bail!("proxy list is empty: set proxy.entries or proxy.file");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
  Marketplace:
    base_url: {}
  Sniper:
    collection: {}
    price_ceiling: {} SOL
    program: {}
    dispatch_delay: {}ms
    max_workers: {}
  Wallet:
    keypair_path: {}
  Proxy:
    inline_entries: {}
    file: {}
"#,
            mask_url(&self.rpc.endpoint),
            self.marketplace.base_url,
            self.sniper.collection_name,
            self.sniper.price_ceiling_sol,
            self.sniper.program_address,
            self.sniper.dispatch_delay_ms,
            self.sniper.max_concurrent_workers,
            self.wallet.keypair_path,
            self.proxy.entries.len(),
            self.proxy.file.as_deref().unwrap_or("(not set)"),
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            marketplace: MarketplaceConfig::default(),
            sniper: SniperConfig::default(),
            wallet: WalletConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            sniper: SniperConfig {
                collection_name: "Degen Ape".into(),
                price_ceiling_sol: 1.0,
                ..SniperConfig::default()
            },
            proxy: ProxyConfig {
                entries: vec!["10.0.0.1:8080:user:pass".into()],
                file: None,
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sniper.dispatch_delay_ms, 10);
        assert_eq!(config.sniper.max_concurrent_workers, 64);
        assert_eq!(config.sniper.program_address, MARKETPLACE_PROGRAM_STR);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_collection() {
        let mut config = valid_config();
        config.sniper.collection_name.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ceiling() {
        let mut config = valid_config();
        config.sniper.price_ceiling_sol = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_proxy_list() {
        let mut config = valid_config();
        config.proxy.entries.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_program_address() {
        let mut config = valid_config();
        config.sniper.program_address = "not-a-pubkey".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_proxy_file_lines_merged() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# fleet A").unwrap();
        writeln!(file, "10.0.0.2:8080:user:pass").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "10.0.0.3:8080:user:pass").unwrap();

        let proxy = ProxyConfig {
            entries: vec!["10.0.0.1:8080:user:pass".into()],
            file: Some(file.path().to_string_lossy().into_owned()),
        };

        let entries = proxy.resolved_entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], "10.0.0.1:8080:user:pass");
        assert_eq!(entries[2], "10.0.0.3:8080:user:pass");
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://rpc.example.com?api-key=secret"),
            "https://rpc.example.com?***"
        );
        assert_eq!(mask_url("https://rpc.example.com"), "https://rpc.example.com");
    }
}
