//! Command line tool configuration.
//!
//! This module loads the tunables of the `triedb` binary from environment
//! variables.
//!
//! # Environment Variables
//!
//! - `TRIEDB_PAGE_SIZE`: Page cache page size in bytes (default: `8192`)
//! - `TRIEDB_NODE_CACHE`: Number of decoded nodes to keep (default: disabled)
//! - `TRIEDB_CONSISTENCY_CHECK`: `1`/`true` to verify every mutated node
//!   (default: `false`)
//!
//! # Invariants
//!
//! - `page_size` is always positive
//! - `node_cache_capacity`, when set, is always positive

use crate::storage::DEFAULT_PAGE_SIZE;
use crate::trie::TrieOptions;

/// Tool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Page size of the write-back cache in front of the file.
    pub page_size: usize,
    /// Capacity of the trie's node cache, if enabled.
    pub node_cache_capacity: Option<usize>,
    /// Whether the trie checks every node it mutates.
    pub consistency_check: bool,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            node_cache_capacity: None,
            consistency_check: false,
        }
    }
}

impl CliConfig {
    pub const PAGE_SIZE_VAR: &'static str = "TRIEDB_PAGE_SIZE";
    pub const NODE_CACHE_VAR: &'static str = "TRIEDB_NODE_CACHE";
    pub const CONSISTENCY_CHECK_VAR: &'static str = "TRIEDB_CONSISTENCY_CHECK";

    /// Load configuration from the process environment.
    ///
    /// Unset variables take their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a
    /// variable or `None` if it is unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let page_size = match lookup(Self::PAGE_SIZE_VAR) {
            Some(value) => parse_positive(Self::PAGE_SIZE_VAR, &value)?,
            None => DEFAULT_PAGE_SIZE,
        };
        let node_cache_capacity = lookup(Self::NODE_CACHE_VAR)
            .map(|value| parse_positive(Self::NODE_CACHE_VAR, &value))
            .transpose()?;
        let consistency_check = match lookup(Self::CONSISTENCY_CHECK_VAR) {
            Some(value) => parse_flag(Self::CONSISTENCY_CHECK_VAR, &value)?,
            None => false,
        };

        Ok(Self {
            page_size,
            node_cache_capacity,
            consistency_check,
        })
    }

    /// Trie options matching this configuration.
    #[must_use]
    pub fn trie_options(&self) -> TrieOptions {
        TrieOptions {
            consistency_check: self.consistency_check,
            node_cache_capacity: self.node_cache_capacity,
            ..TrieOptions::default()
        }
    }
}

fn parse_positive(name: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a positive integer"),
        }),
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a boolean"),
        }),
    }
}
