use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::browser::session::DEFAULT_HELPER_SCRIPT;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "element-cache",
    version,
    about = "Inspect and maintain the persisted UI element cache"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: element-cache.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Cache directory (overrides the config file)
    #[arg(long, global = true)]
    pub cache_dir: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List cached pages with element count, version and age
    List,

    /// Show metadata for one cached page
    Info {
        /// Page URL (query parameters in any order)
        #[arg(long)]
        url: String,
    },

    /// Pretty-print the cached element set for a page
    Show {
        #[arg(long)]
        url: String,
    },

    /// Remove one cached page, or everything when --url is omitted
    Clear {
        #[arg(long)]
        url: Option<String>,
    },

    /// Open a page in the page helper and refresh its cache entry
    Refresh {
        #[arg(long)]
        url: String,

        /// Replace the entry even if it is fresh and valid
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Page helper script
        #[arg(long, default_value = DEFAULT_HELPER_SCRIPT)]
        helper: String,
    },

    /// Open a page and resolve an element description against it
    Find {
        #[arg(long)]
        url: String,

        /// Explicit element handle
        #[arg(long)]
        handle: Option<String>,

        /// CSS selector
        #[arg(long)]
        selector: Option<String>,

        /// ARIA role
        #[arg(long)]
        role: Option<String>,

        /// Accessible name (with --role)
        #[arg(long)]
        name: Option<String>,

        /// Visible text
        #[arg(long)]
        text: Option<String>,

        /// Match text exactly (whitespace-normalized) instead of substring
        #[arg(long, default_value_t = false)]
        exact: bool,

        /// Restrict text matches to this tag
        #[arg(long)]
        tag: Option<String>,

        #[arg(long, default_value = DEFAULT_HELPER_SCRIPT)]
        helper: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `element-cache.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCacheConfig {
    #[serde(default = "default_cache_directory", alias = "cacheDirectory")]
    pub cache_directory: String,

    #[serde(default = "default_ttl_seconds", alias = "ttlSeconds")]
    pub ttl_seconds: u64,

    #[serde(default = "default_sample_size", alias = "validationSampleSize")]
    pub validation_sample_size: usize,

    #[serde(default = "default_threshold", alias = "validationThreshold")]
    pub validation_threshold: f64,

    #[serde(default = "default_max_attempts", alias = "resolverMaxAttempts")]
    pub resolver_max_attempts: u32,

    #[serde(default = "default_retry_delay_ms", alias = "resolverRetryDelayMs")]
    pub resolver_retry_delay_ms: u64,

    #[serde(default = "default_lookup_timeout_ms", alias = "lookupTimeoutMs")]
    pub lookup_timeout_ms: u64,

    #[serde(default = "default_snapshot_timeout_ms", alias = "snapshotTimeoutMs")]
    pub snapshot_timeout_ms: u64,

    #[serde(default = "default_validation_timeout_ms", alias = "validationTimeoutMs")]
    pub validation_timeout_ms: u64,

    /// Failed resolver rounds before a forced cache refresh; 0 disables
    #[serde(default = "default_one", alias = "refreshAfterFailedRounds")]
    pub refresh_after_failed_rounds: u32,

    /// Also treat visible-text changes as element modifications
    #[serde(default, alias = "compareText")]
    pub compare_text: bool,

    /// JSONL decision trace path; no trace when unset
    #[serde(default, alias = "traceFile")]
    pub trace_file: Option<String>,
}

impl Default for ElementCacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: default_cache_directory(),
            ttl_seconds: default_ttl_seconds(),
            validation_sample_size: default_sample_size(),
            validation_threshold: default_threshold(),
            resolver_max_attempts: default_max_attempts(),
            resolver_retry_delay_ms: default_retry_delay_ms(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            snapshot_timeout_ms: default_snapshot_timeout_ms(),
            validation_timeout_ms: default_validation_timeout_ms(),
            refresh_after_failed_rounds: default_one(),
            compare_text: false,
            trace_file: None,
        }
    }
}

impl ElementCacheConfig {
    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.cache_directory)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.resolver_retry_delay_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    pub fn validation_timeout(&self) -> Duration {
        Duration::from_millis(self.validation_timeout_ms)
    }
}

// Serde default helpers
fn default_cache_directory() -> String { "cache_data".to_string() }
fn default_ttl_seconds() -> u64 { 86_400 }
fn default_sample_size() -> usize { 3 }
fn default_threshold() -> f64 { 0.7 }
fn default_max_attempts() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 500 }
fn default_lookup_timeout_ms() -> u64 { 3_000 }
fn default_snapshot_timeout_ms() -> u64 { 10_000 }
fn default_validation_timeout_ms() -> u64 { 2_000 }
fn default_one() -> u32 { 1 }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> ElementCacheConfig {
    let config_path = path.unwrap_or("element-cache.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => parse_config(&content),
        Err(_) => ElementCacheConfig::default(),
    }
}

pub fn parse_config(content: &str) -> ElementCacheConfig {
    match serde_yaml::from_str(content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "malformed config file, using defaults");
            ElementCacheConfig::default()
        }
    }
}

/// Apply CLI overrides on top of the loaded config.
pub fn apply_overrides(mut config: ElementCacheConfig, cli: &Cli) -> ElementCacheConfig {
    if let Some(dir) = &cli.cache_dir {
        config.cache_directory = dir.clone();
    }
    config
}
