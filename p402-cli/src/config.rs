//! Client configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! default_chain = "base"
//! max_amount = "0.50"
//! auto_pay = true
//! poll_interval_ms = 2000
//! max_polls = 30
//! wallet_private_key = "$P402_PRIVATE_KEY"
//!
//! [chains."8453"]
//! rpc_url = "https://base-mainnet.example.com/${RPC_TOKEN}"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `p402.toml`)
//! - Any variable referenced by `$VAR` in the config file

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use p402::amount::Amount;
use p402::chain::{ChainId, ChainPolicy, ChainProfiles};
use p402::settlement::{DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL, PollPolicy};
use p402_http::NegotiatorOptions;
use regex::{Captures, Regex};
use serde::Deserialize;
use url::Url;

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "p402.toml";

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("env var pattern is valid")
});

/// Errors loading or applying the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`ClientConfig`].
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A chain is named that no profile knows.
    #[error("unknown chain {0:?}")]
    UnknownChain(String),
    /// A value is out of range.
    #[error("invalid {key}: {reason}")]
    Invalid {
        /// Offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Chain to pay on when the server names none (key or chain id).
    pub default_chain: Option<String>,
    /// Spending cap per request.
    pub max_amount: Option<Amount>,
    /// Settle automatically on 402.
    pub auto_pay: bool,
    /// Send `X-Payment-Chain` on the paid retry.
    pub send_chain_header: bool,
    /// Also send the legacy `X-Payment-TX` header.
    pub legacy_proof_header: bool,
    /// Wait before each receipt poll, in milliseconds.
    pub poll_interval_ms: u64,
    /// Receipt polls before giving up.
    pub max_polls: u32,
    /// Timeout for each HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// Hex private key of the paying account.
    pub wallet_private_key: Option<String>,
    /// Per-chain overrides keyed by chain id or key.
    pub chains: HashMap<String, ChainOverride>,
}

/// Per-chain overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainOverride {
    /// HTTP RPC endpoint.
    pub rpc_url: Url,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_chain: None,
            max_amount: None,
            auto_pay: true,
            send_chain_header: true,
            legacy_proof_header: false,
            poll_interval_ms: u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(2_000),
            max_polls: DEFAULT_MAX_POLLS,
            request_timeout_secs: 30,
            wallet_private_key: None,
            chains: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&content, |name| std::env::var(name).ok())
    }

    /// Parses TOML, expanding `$VAR` / `${VAR}` through `lookup` first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the expanded text is not a valid
    /// configuration.
    pub fn parse(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content, lookup);
        let config: Self = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would pay without ever confirming, or never send.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first zero among
    /// `max_polls`, `poll_interval_ms` and `request_timeout_secs`.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        let must_be_positive = "must be greater than zero";
        if self.max_polls == 0 {
            return Err(ConfigError::Invalid {
                key: "max_polls",
                reason: must_be_positive,
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_interval_ms",
                reason: must_be_positive,
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: must_be_positive,
            });
        }
        Ok(())
    }

    /// Applies the RPC overrides to `profiles`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownChain`] if an override names no known chain.
    pub fn apply_overrides(&self, mut profiles: ChainProfiles) -> Result<ChainProfiles, ConfigError> {
        for (name, chain) in &self.chains {
            let chain_id = resolve_chain(&profiles, name)?;
            profiles = profiles.with_rpc_url(chain_id, chain.rpc_url.clone());
        }
        Ok(profiles)
    }

    /// The fallback chain, if configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownChain`] if `default_chain` names no known chain.
    pub fn default_chain_id(&self, profiles: &ChainProfiles) -> Result<Option<ChainId>, ConfigError> {
        self.default_chain
            .as_deref()
            .map(|name| resolve_chain(profiles, name))
            .transpose()
    }

    /// Negotiator options. A configured default chain turns on the wallet
    /// fallback.
    #[must_use]
    pub fn negotiator_options(&self) -> NegotiatorOptions {
        NegotiatorOptions {
            auto_pay: self.auto_pay,
            max_amount: self.max_amount,
            chain_policy: if self.default_chain.is_some() {
                ChainPolicy::WalletFallback
            } else {
                ChainPolicy::ServerOnly
            },
            send_chain_header: self.send_chain_header,
            legacy_proof_header: self.legacy_proof_header,
        }
    }

    /// Receipt polling policy.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_polls: self.max_polls,
        }
    }

    /// Request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The private key, unless it is empty or an unresolved `$VAR`.
    #[must_use]
    pub fn wallet_private_key(&self) -> Option<&str> {
        self.wallet_private_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !key.starts_with('$'))
    }
}

/// Finds a chain by numeric id or by key.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownChain`] if neither matches.
pub fn resolve_chain(profiles: &ChainProfiles, name: &str) -> Result<ChainId, ConfigError> {
    let by_id = name
        .parse::<ChainId>()
        .ok()
        .and_then(|id| profiles.by_chain_id(id));
    by_id
        .or_else(|| profiles.by_key(name))
        .map(|profile| profile.chain_id)
        .ok_or_else(|| ConfigError::UnknownChain(name.to_owned()))
}

/// Expands `$VAR` and `${VAR}` patterns. Unresolved variables are left as-is.
fn expand_env_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    ENV_VAR
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            lookup(name).unwrap_or_else(|| caps[0].to_owned())
        })
        .into_owned()
}
