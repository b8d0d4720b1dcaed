//! Configuration management for menud.
//!
//! Loads settings from /etc/menud/config.toml (or a path given on the
//! command line) and falls back to defaults on any problem. The matching
//! threshold and restaurant bonus are hand-tuned numbers, so they live
//! here rather than as code constants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Default config file path.
pub const CONFIG_PATH: &str = "/etc/menud/config.toml";

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// End-to-end deadline per request in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Fuzzy-matching knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Score at or above which a corpus entry counts as the same dish.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Threshold for the cheaper overlap strategy on interactive lookups.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,

    /// Flat bonus when the candidate was recorded at the same restaurant.
    #[serde(default = "default_restaurant_bonus")]
    pub restaurant_bonus: f64,
}

fn default_match_threshold() -> f64 {
    0.80
}

fn default_overlap_threshold() -> f64 {
    0.6
}

fn default_restaurant_bonus() -> f64 {
    0.10
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            overlap_threshold: default_overlap_threshold(),
            restaurant_bonus: default_restaurant_bonus(),
        }
    }
}

/// Request governor settings: origin allow-list and per-client rate window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Origins admitted verbatim.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Wildcard patterns for preview deployments, e.g. "https://*.vercel.app".
    #[serde(default)]
    pub origin_patterns: Vec<String>,

    /// Admit requests that carry no Origin/Referer header (curl, server-side).
    #[serde(default = "default_allow_missing_origin")]
    pub allow_missing_origin: bool,

    /// Admissions per window per client key.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://whatthemenu.com".to_string(),
        "https://www.whatthemenu.com".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

fn default_allow_missing_origin() -> bool {
    true
}

fn default_max_requests() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    300
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            origin_patterns: Vec::new(),
            allow_missing_origin: default_allow_missing_origin(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Free-tier metering for generation calls. Cache hits are never metered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Fresh generations per day for anonymous clients. 0 disables the cap.
    #[serde(default = "default_anonymous_daily")]
    pub anonymous_daily: u32,

    /// Fresh generations per day for authenticated users. 0 disables the cap.
    #[serde(default = "default_authenticated_daily")]
    pub authenticated_daily: u32,
}

fn default_anonymous_daily() -> u32 {
    5
}

fn default_authenticated_daily() -> u32 {
    50
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            anonymous_daily: default_anonymous_daily(),
            authenticated_daily: default_authenticated_daily(),
        }
    }
}

/// External AI generator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Base URL of the Generative Language API.
    #[serde(default = "default_generator_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_generator_model")]
    pub model: String,

    /// API key; when absent the env var below is consulted at startup.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_generator_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_generator_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_generator_timeout() -> u64 {
    30
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generator_endpoint(),
            model: default_generator_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

impl GeneratorConfig {
    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

/// Corpus store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Whether "not a food item" sentinel results are written to the corpus.
    #[serde(default = "default_persist_non_food")]
    pub persist_non_food: bool,
}

fn default_db_path() -> String {
    "/var/lib/menud/corpus.db".to_string()
}

fn default_persist_non_food() -> bool {
    true
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            persist_non_food: default_persist_non_food(),
        }
    }
}

/// Static bearer-token table. Real identity providers stay behind this seam.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// token -> user id
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenudConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub governor: GovernorConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl MenudConfig {
    /// Load from the given path, or the default path, or defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<MenudConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config at {}: {} - using defaults", path.display(), e);
                    MenudConfig::default()
                }
            },
            Err(_) => {
                info!("No config at {}, using defaults", path.display());
                MenudConfig::default()
            }
        }
    }
}
