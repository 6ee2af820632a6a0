//! Service configuration.
//!
//! Every operating parameter is resolved once, at startup, into plain
//! structs that are handed to the components that need them. Values come
//! from the process environment (a `.env` file is honoured by `main`) and
//! fall back to the defaults below when unset.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::emergency::EmergencyKeywords;

/// Application-level constants
pub const APP_NAME: &str = "Digital Triage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2:3b";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_TOP_P: f32 = 0.9;
const DEFAULT_PORT: u16 = 5000;

/// Filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "digital_triage=info,tower_http=warn"
}

/// Get the application data directory
/// ~/DigitalTriage/ when a home directory exists, the working directory otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("DigitalTriage"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default location of the SQLite database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("triage.db")
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid generation endpoint URL: '{0}'")]
    InvalidUrl(String),

    #[error("Invalid model name: '{0}'")]
    InvalidModelName(String),
}

// ═══════════════════════════════════════════════════════════
// Configuration structs
// ═══════════════════════════════════════════════════════════

/// Parameters for the text-generation endpoint.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:11434`.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    /// Bound on the whole streaming request, not per chunk.
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// How long stored data is kept before the retention sweep removes it.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub chat_retention_days: i64,
    pub patient_retention_days: i64,
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            chat_retention_days: 7,
            patient_retention_days: 30,
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Request-counting limits.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// User chat messages admitted per session within `chat_window`.
    pub chat_messages: u32,
    pub chat_window: Duration,
    /// API requests admitted per session per hour.
    pub requests_per_hour: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            chat_messages: 10,
            chat_window: Duration::from_secs(60 * 60),
            requests_per_hour: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub generation: GenerationConfig,
    pub emergency_keywords: EmergencyKeywords,
    pub retention: RetentionConfig,
    pub rate_limits: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            database_path: default_database_path(),
            generation: GenerationConfig::default(),
            emergency_keywords: EmergencyKeywords::default(),
            retention: RetentionConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unset or blank keys take their defaults; set keys that fail to parse
    /// are reported rather than silently replaced.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = AppConfig::default();

        let host: IpAddr = parse_or(get("HOST"), "HOST", defaults.bind_addr.ip())?;
        let port: u16 = parse_or(get("PORT"), "PORT", defaults.bind_addr.port())?;

        let base_url = get("OLLAMA_BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or(defaults.generation.base_url);
        validate_base_url(&base_url)?;

        let model = get("PRIMARY_MODEL").unwrap_or(defaults.generation.model);
        validate_model_name(&model)?;

        let timeout_secs: u64 = parse_or(get("AI_TIMEOUT"), "AI_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AI_TIMEOUT",
                value: "0".to_string(),
            });
        }

        let temperature: f32 = parse_or(get("AI_TEMPERATURE"), "AI_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        let top_p: f32 = parse_or(get("AI_TOP_P"), "AI_TOP_P", DEFAULT_TOP_P)?;

        let keywords = get("EMERGENCY_KEYWORDS")
            .map(|raw| raw.split(',').map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default();

        let chat_retention_days = parse_or(
            get("CHAT_DATA_RETENTION_DAYS"),
            "CHAT_DATA_RETENTION_DAYS",
            defaults.retention.chat_retention_days,
        )?;
        let patient_retention_days = parse_or(
            get("PATIENT_DATA_RETENTION_DAYS"),
            "PATIENT_DATA_RETENTION_DAYS",
            defaults.retention.patient_retention_days,
        )?;
        let sweep_minutes: u64 = parse_or(get("RETENTION_SWEEP_MINUTES"), "RETENTION_SWEEP_MINUTES", 60)?;

        let chat_messages = parse_or(
            get("CHAT_RATE_LIMIT"),
            "CHAT_RATE_LIMIT",
            defaults.rate_limits.chat_messages,
        )?;

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            generation: GenerationConfig {
                base_url,
                model,
                temperature,
                top_p,
                timeout: Duration::from_secs(timeout_secs),
            },
            emergency_keywords: EmergencyKeywords::new(keywords),
            retention: RetentionConfig {
                chat_retention_days,
                patient_retention_days,
                sweep_interval: Duration::from_secs(sweep_minutes.max(1) * 60),
            },
            rate_limits: RateLimitConfig {
                chat_messages,
                ..defaults.rate_limits
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

// ═══════════════════════════════════════════════════════════
// Validators
// ═══════════════════════════════════════════════════════════

/// Check that the generation endpoint is an http(s) URL with a host.
pub fn validate_base_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }
    Ok(())
}

/// Whether the endpoint stays on this machine.
///
/// Prompts contain patient data; a remote endpoint is allowed but logged.
pub fn is_loopback_endpoint(url: &str) -> bool {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return false;
    };
    match parsed.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}

/// Validate a model name against the Ollama naming convention.
///
/// Format: `[namespace/]model[:tag]`, each segment starting with an
/// alphanumeric character, at most one namespace.
pub fn validate_model_name(name: &str) -> Result<(), ConfigError> {
    let valid = regex::Regex::new(
        r"^[a-zA-Z0-9][a-zA-Z0-9._-]*(/[a-zA-Z0-9][a-zA-Z0-9._-]*)?(:[a-zA-Z0-9._-]+)?$",
    )
    .map_err(|_| ConfigError::InvalidModelName(name.to_string()))?;

    if !valid.is_match(name) {
        return Err(ConfigError::InvalidModelName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.generation.base_url, "http://localhost:11434");
        assert_eq!(config.generation.model, "llama3.2:3b");
        assert_eq!(config.generation.timeout, Duration::from_secs(60));
        assert!((config.generation.temperature - 0.3).abs() < f32::EPSILON);
        assert!((config.generation.top_p - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.retention.chat_retention_days, 7);
        assert_eq!(config.retention.patient_retention_days, 30);
        assert_eq!(config.rate_limits.chat_messages, 10);
        assert_eq!(config.emergency_keywords.len(), 8);
    }

    #[test]
    fn environment_overrides_generation_settings() {
        let config = load(&[
            ("OLLAMA_BASE_URL", "http://127.0.0.1:9999/"),
            ("PRIMARY_MODEL", "gemma3:4b"),
            ("AI_TIMEOUT", "10"),
            ("AI_TEMPERATURE", "0.7"),
            ("AI_TOP_P", "0.5"),
        ])
        .unwrap();
        assert_eq!(config.generation.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.generation.model, "gemma3:4b");
        assert_eq!(config.generation.timeout, Duration::from_secs(10));
        assert!((config.generation.top_p - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("PRIMARY_MODEL", "   "), ("EMERGENCY_KEYWORDS", "")]).unwrap();
        assert_eq!(config.generation.model, DEFAULT_MODEL);
        assert_eq!(config.emergency_keywords.len(), 8);
    }

    #[test]
    fn custom_keywords_replace_defaults() {
        let config = load(&[("EMERGENCY_KEYWORDS", "Seizure, choking ,")]).unwrap();
        assert_eq!(config.emergency_keywords.len(), 2);
        assert!(config.emergency_keywords.detect("patient is CHOKING"));
    }

    #[test]
    fn unparsable_number_is_reported() {
        let err = load(&[("AI_TIMEOUT", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "AI_TIMEOUT", .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(load(&[("AI_TIMEOUT", "0")]).is_err());
    }

    #[test]
    fn invalid_model_name_is_rejected() {
        assert!(matches!(
            load(&[("PRIMARY_MODEL", "../etc/passwd")]),
            Err(ConfigError::InvalidModelName(_))
        ));
    }

    #[test]
    fn model_name_accepts_namespace_and_tag() {
        assert!(validate_model_name("llama3.2:3b").is_ok());
        assert!(validate_model_name("dcarrascosa/medgemma-1.5-4b-it").is_ok());
        assert!(validate_model_name("a/b/c").is_err());
        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("; rm -rf /").is_err());
    }

    #[test]
    fn base_url_requires_http_scheme() {
        assert!(validate_base_url("http://localhost:11434").is_ok());
        assert!(validate_base_url("https://ollama.internal").is_ok());
        assert!(validate_base_url("ftp://localhost").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback_endpoint("http://localhost:11434"));
        assert!(is_loopback_endpoint("http://127.0.0.1:11434"));
        assert!(is_loopback_endpoint("http://[::1]:11434"));
        assert!(!is_loopback_endpoint("http://ollama:11434"));
        assert!(!is_loopback_endpoint("http://192.168.1.100:11434"));
    }

    #[test]
    fn app_data_dir_ends_with_app_folder() {
        assert!(app_data_dir().ends_with("DigitalTriage") || app_data_dir() == PathBuf::from("."));
    }
}
