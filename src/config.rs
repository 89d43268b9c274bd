pub use config::{Config, Environment, File as ConfigFile};
pub use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::error::Error;

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

/// Load `config.toml` (optional) plus `CHAINVIEW__*` environment overrides.
pub fn load_config(path: &str) -> Result<Config, Box<dyn Error>> {
    let config = Config::builder()
        .add_source(ConfigFile::with_name(path).required(false))
        .add_source(Environment::with_prefix("CHAINVIEW").separator("__"))
        .build()?;
    Ok(config)
}

pub fn init_global_config(path: &str) -> Result<(), Box<dyn Error>> {
    let config = load_config(path)?;
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| "Config already set")?;
    Ok(())
}

pub fn get_global_config() -> Option<&'static Config> {
    GLOBAL_CONFIG.get()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
    Regtest,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Test => "test",
            Network::Regtest => "regtest",
        }
    }

    pub fn parse(name: &str) -> Result<Self, Box<dyn Error>> {
        match name {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("Unknown network '{}'", other).into()),
        }
    }
}

/// Consensus constants the queries need
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainParams {
    pub network: Network,
    /// Proof-of-work limit in compact form; difficulty 1.0 by definition
    pub pow_limit_bits: u32,
    /// Blocks examined for soft-fork majority votes
    pub majority_window: usize,
    /// Upgraded blocks needed before new-version rules are enforced
    pub majority_enforce_upgrade: usize,
    /// Upgraded blocks needed before old-version blocks are rejected
    pub majority_reject_outdated: usize,
}

impl ChainParams {
    pub fn main() -> Self {
        Self {
            network: Network::Main,
            pow_limit_bits: 0x1f07ffff,
            majority_window: 4000,
            majority_enforce_upgrade: 750,
            majority_reject_outdated: 950,
        }
    }

    pub fn test() -> Self {
        Self {
            network: Network::Test,
            pow_limit_bits: 0x2007ffff,
            majority_window: 400,
            majority_enforce_upgrade: 51,
            majority_reject_outdated: 75,
        }
    }

    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            pow_limit_bits: 0x200f0f0f,
            majority_window: 1000,
            majority_enforce_upgrade: 750,
            majority_reject_outdated: 950,
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => Self::main(),
            Network::Test => Self::test(),
            Network::Regtest => Self::regtest(),
        }
    }

    /// Network preset selected by `network`, with `consensus.*` overrides.
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn Error>> {
        Self::from_config_or(config, Network::Main)
    }

    /// Like `from_config`, using `fallback` when no network is configured.
    pub fn from_config_or(config: &Config, fallback: Network) -> Result<Self, Box<dyn Error>> {
        let network = match config.get_string("network") {
            Ok(name) => Network::parse(&name)?,
            Err(config::ConfigError::NotFound(_)) => fallback,
            Err(e) => return Err(e.into()),
        };
        let mut params = Self::for_network(network);

        if let Some(bits) = optional_string(config, "consensus.pow_limit_bits")? {
            let trimmed = bits.trim_start_matches("0x");
            params.pow_limit_bits = u32::from_str_radix(trimmed, 16)
                .map_err(|e| format!("Invalid consensus.pow_limit_bits '{}': {}", bits, e))?;
        }
        if let Some(v) = optional_usize(config, "consensus.majority_window")? {
            params.majority_window = v;
        }
        if let Some(v) = optional_usize(config, "consensus.majority_enforce_upgrade")? {
            params.majority_enforce_upgrade = v;
        }
        if let Some(v) = optional_usize(config, "consensus.majority_reject_outdated")? {
            params.majority_reject_outdated = v;
        }
        Ok(params)
    }
}

fn optional_string(config: &Config, key: &str) -> Result<Option<String>, Box<dyn Error>> {
    match config.get_string(key) {
        Ok(v) => Ok(Some(v)),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn optional_usize(config: &Config, key: &str) -> Result<Option<usize>, Box<dyn Error>> {
    match config.get_int(key) {
        Ok(v) if v < 0 => Err(format!("{} must not be negative", key).into()),
        Ok(v) => Ok(Some(v as usize)),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_to_main() {
        let config = Config::builder().build().unwrap();
        let params = ChainParams::from_config(&config).unwrap();
        assert_eq!(params, ChainParams::main());
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chainview.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "network = \"regtest\"\n\n[consensus]\nmajority_window = 5\npow_limit_bits = \"0x207fffff\""
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        let params = ChainParams::from_config(&config).unwrap();
        assert_eq!(params.network, Network::Regtest);
        assert_eq!(params.majority_window, 5);
        assert_eq!(params.pow_limit_bits, 0x207fffff);
        assert_eq!(params.majority_enforce_upgrade, 750);
    }

    #[test]
    fn test_fallback_network() {
        let config = Config::builder().build().unwrap();
        let params = ChainParams::from_config_or(&config, Network::Test).unwrap();
        assert_eq!(params, ChainParams::test());
    }

    #[test]
    fn test_unknown_network_rejected() {
        let config = Config::builder()
            .set_override("network", "moon")
            .unwrap()
            .build()
            .unwrap();
        assert!(ChainParams::from_config(&config).is_err());
    }
}
