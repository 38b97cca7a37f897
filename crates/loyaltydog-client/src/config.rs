//! # Integration Configuration
//!
//! Merchant settings for the LoyaltyDog integration.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LOYALTYDOG_API_KEY=...                                             │
//! │     LOYALTYDOG_PROGRAM_ID=...                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/loyaltydog/loyaltydog.toml (Linux)                       │
//! │     ~/Library/Application Support/dog.loyalty.loyaltydog/... (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     production API url, ratio 1:1, round, earn on "processing"         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! url = "https://app.loyalty.dog/api/v1"
//! program_id = "1234"
//! api_key = "secret"
//! timeout_secs = 30
//! accept_invalid_certs = false
//! debug = false
//!
//! [points]
//! earn_when = "processing"   # pending | processing | on-hold | completed
//! ratio = "1:1"
//! rounding = "round"         # round | floor | ceil
//! account_signup_points = 50
//! write_review_points = 10
//!
//! [messages]
//! available_offer = "<strong>Active Loyalty Offer:</strong> {friendlyNameToBeAdded}"
//! redeem_offer = "<strong>Loyalty Reward:</strong> {friendlyNameToBeAdded}"
//!
//! [cache]
//! customer_ttl_secs = 30
//! offer_ttl_secs = 3600
//! # redis_url = "redis://127.0.0.1/"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use loyaltydog_core::message::{DEFAULT_AVAILABLE_OFFER_MESSAGE, DEFAULT_REDEEM_OFFER_MESSAGE};
use loyaltydog_core::points::{PointsCalculator, PointsRatio, RoundingMode};
use loyaltydog_core::validation::validate_api_url;
use loyaltydog_core::{CUSTOMER_DETAILS_CACHE_SECS, DEFAULT_API_URL, OFFER_DETAILS_CACHE_SECS};

use crate::error::{ClientError, ClientResult};

const CONFIG_FILE_NAME: &str = "loyaltydog.toml";

// =============================================================================
// Earn Trigger
// =============================================================================

/// Order status at which purchase points are awarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EarnWhen {
    Pending,
    #[default]
    Processing,
    OnHold,
    Completed,
}

impl EarnWhen {
    /// Host status slug this trigger listens for.
    pub fn as_status(&self) -> &'static str {
        match self {
            EarnWhen::Pending => "pending",
            EarnWhen::Processing => "processing",
            EarnWhen::OnHold => "on-hold",
            EarnWhen::Completed => "completed",
        }
    }
}

impl fmt::Display for EarnWhen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_status())
    }
}

impl FromStr for EarnWhen {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(EarnWhen::Pending),
            "processing" => Ok(EarnWhen::Processing),
            "on-hold" | "on_hold" => Ok(EarnWhen::OnHold),
            "completed" => Ok(EarnWhen::Completed),
            other => Err(ClientError::Config(format!(
                "Unknown order status: '{}'. Valid options: pending, processing, on-hold, completed",
                other
            ))),
        }
    }
}

// =============================================================================
// API Settings
// =============================================================================

/// Upstream connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the LoyaltyDog API.
    #[serde(default = "default_api_url")]
    pub url: String,

    #[serde(default)]
    pub program_id: String,

    /// Sent verbatim as the `Authorization` header.
    #[serde(default)]
    pub api_key: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification. Only for test environments.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Verbose request/response logging.
    #[serde(default)]
    pub debug: bool,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            url: default_api_url(),
            program_id: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout(),
            accept_invalid_certs: false,
            debug: false,
        }
    }
}

impl ApiSettings {
    /// API key safe for logs: first four characters, rest masked.
    pub fn masked_api_key(&self) -> String {
        mask_secret(&self.api_key)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("url", &self.url)
            .field("program_id", &self.program_id)
            .field("api_key", &self.masked_api_key())
            .field("timeout_secs", &self.timeout_secs)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("debug", &self.debug)
            .finish()
    }
}

/// Masks everything but a short prefix of a secret.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    if visible.len() == secret.len() {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

// =============================================================================
// Points Settings
// =============================================================================

/// How points are earned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsSettings {
    #[serde(default)]
    pub earn_when: EarnWhen,

    /// `points:monetary_value`, e.g. `"1:1"`.
    #[serde(default = "default_ratio")]
    pub ratio: String,

    #[serde(default)]
    pub rounding: RoundingMode,

    /// Points for creating an account (0 disables).
    #[serde(default)]
    pub account_signup_points: i64,

    /// Points for a first product review (0 disables).
    #[serde(default)]
    pub write_review_points: i64,
}

fn default_ratio() -> String {
    "1:1".to_string()
}

impl Default for PointsSettings {
    fn default() -> Self {
        PointsSettings {
            earn_when: EarnWhen::default(),
            ratio: default_ratio(),
            rounding: RoundingMode::default(),
            account_signup_points: 0,
            write_review_points: 0,
        }
    }
}

impl PointsSettings {
    pub fn calculator(&self) -> PointsCalculator {
        PointsCalculator::new(self.ratio.clone(), self.rounding)
    }
}

// =============================================================================
// Message Settings
// =============================================================================

/// Customer-facing templates. An empty template disables the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSettings {
    #[serde(default = "default_available_offer")]
    pub available_offer: String,

    #[serde(default = "default_redeem_offer")]
    pub redeem_offer: String,
}

fn default_available_offer() -> String {
    DEFAULT_AVAILABLE_OFFER_MESSAGE.to_string()
}

fn default_redeem_offer() -> String {
    DEFAULT_REDEEM_OFFER_MESSAGE.to_string()
}

impl Default for MessageSettings {
    fn default() -> Self {
        MessageSettings {
            available_offer: default_available_offer(),
            redeem_offer: default_redeem_offer(),
        }
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_customer_ttl")]
    pub customer_ttl_secs: u64,

    #[serde(default = "default_offer_ttl")]
    pub offer_ttl_secs: u64,

    /// Use a shared Redis store instead of the in-process cache.
    #[serde(default)]
    pub redis_url: Option<String>,
}

fn default_customer_ttl() -> u64 {
    CUSTOMER_DETAILS_CACHE_SECS
}

fn default_offer_ttl() -> u64 {
    OFFER_DETAILS_CACHE_SECS
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            customer_ttl_secs: default_customer_ttl(),
            offer_ttl_secs: default_offer_ttl(),
            redis_url: None,
        }
    }
}

impl CacheSettings {
    pub fn customer_ttl(&self) -> Duration {
        Duration::from_secs(self.customer_ttl_secs)
    }

    pub fn offer_ttl(&self) -> Duration {
        Duration::from_secs(self.offer_ttl_secs)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete integration configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoyaltyConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub points: PointsSettings,

    #[serde(default)]
    pub messages: MessageSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

impl LoyaltyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (loyaltydog.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading LoyaltyDog config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load LoyaltyDog config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSave("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ClientError::ConfigSave(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSave(e.to_string()))?;

        info!(?path, "LoyaltyDog config saved");
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Missing credentials are not an error here: the integration stays
    /// installed and the admin notices ask for them.
    pub fn validate(&self) -> ClientResult<()> {
        validate_api_url(&self.api.url)?;

        if self.api.timeout_secs == 0 {
            return Err(ClientError::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        PointsRatio::parse(&self.points.ratio).map_err(|e| ClientError::Config(e.to_string()))?;

        if self.points.account_signup_points < 0 || self.points.write_review_points < 0 {
            return Err(ClientError::Config(
                "action points must not be negative".into(),
            ));
        }

        Ok(())
    }

    /// Fails unless both credentials are present.
    pub fn require_credentials(&self) -> ClientResult<()> {
        if self.api.program_id.trim().is_empty() {
            return Err(ClientError::Config("program_id is required".into()));
        }
        if self.api.api_key.trim().is_empty() {
            return Err(ClientError::Config("api_key is required".into()));
        }
        Ok(())
    }

    /// True when program id and API key are both set.
    pub fn has_credentials(&self) -> bool {
        self.require_credentials().is_ok()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies `LOYALTYDOG_*` overrides using `lookup` to read variables.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LOYALTYDOG_API_URL") {
            debug!(url = %url, "Overriding API url from environment");
            self.api.url = url;
        }

        if let Some(program_id) = lookup("LOYALTYDOG_PROGRAM_ID") {
            debug!(program_id = %program_id, "Overriding program id from environment");
            self.api.program_id = program_id;
        }

        if let Some(api_key) = lookup("LOYALTYDOG_API_KEY") {
            debug!(api_key = %mask_secret(&api_key), "Overriding API key from environment");
            self.api.api_key = api_key;
        }

        if let Some(debug_flag) = lookup("LOYALTYDOG_DEBUG") {
            self.api.debug = parse_flag(&debug_flag);
        }

        if let Some(accept) = lookup("LOYALTYDOG_ACCEPT_INVALID_CERTS") {
            self.api.accept_invalid_certs = parse_flag(&accept);
        }

        if let Some(ratio) = lookup("LOYALTYDOG_EARN_POINTS_RATIO") {
            debug!(ratio = %ratio, "Overriding points ratio from environment");
            self.points.ratio = ratio;
        }

        if let Some(rounding) = lookup("LOYALTYDOG_EARN_POINTS_ROUNDING") {
            match rounding.parse() {
                Ok(mode) => self.points.rounding = mode,
                Err(e) => warn!(rounding = %rounding, error = %e, "Unknown rounding mode in environment"),
            }
        }

        if let Some(status) = lookup("LOYALTYDOG_EARN_POINTS_WHEN") {
            match status.parse() {
                Ok(when) => self.points.earn_when = when,
                Err(_) => warn!(status = %status, "Unknown order status in environment"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dog", "loyalty", "loyaltydog")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LoyaltyConfig::default();
        assert_eq!(config.api.url, "https://app.loyalty.dog/api/v1");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.points.earn_when, EarnWhen::Processing);
        assert_eq!(config.points.ratio, "1:1");
        assert_eq!(config.points.rounding, RoundingMode::Round);
        assert_eq!(config.cache.customer_ttl_secs, 30);
        assert_eq!(config.cache.offer_ttl_secs, 3600);
        assert!(config.validate().is_ok());
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_tls_verification_enabled_by_default() {
        assert!(!LoyaltyConfig::default().api.accept_invalid_certs);

        let parsed: LoyaltyConfig = toml::from_str("[api]\nprogram_id = \"1\"\n").unwrap();
        assert!(!parsed.api.accept_invalid_certs);
    }

    #[test]
    fn test_earn_when_parsing() {
        assert_eq!("on-hold".parse::<EarnWhen>().unwrap(), EarnWhen::OnHold);
        assert_eq!("Completed".parse::<EarnWhen>().unwrap(), EarnWhen::Completed);
        assert!("shipped".parse::<EarnWhen>().is_err());

        let parsed: LoyaltyConfig = toml::from_str("[points]\nearn_when = \"on-hold\"\n").unwrap();
        assert_eq!(parsed.points.earn_when, EarnWhen::OnHold);
    }

    #[test]
    fn test_validation() {
        let mut config = LoyaltyConfig::default();

        config.api.url = "not a url".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.api.url = DEFAULT_API_URL.into();
        config.points.ratio = "1:0".into();
        assert!(config.validate().is_err());

        config.points.ratio = "2:1".into();
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LOYALTYDOG_PROGRAM_ID", "42"),
            ("LOYALTYDOG_API_KEY", "secret-key"),
            ("LOYALTYDOG_DEBUG", "yes"),
            ("LOYALTYDOG_EARN_POINTS_ROUNDING", "ceil"),
            ("LOYALTYDOG_EARN_POINTS_RATIO", "2:1"),
        ]);

        let mut config = LoyaltyConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.program_id, "42");
        assert_eq!(config.api.api_key, "secret-key");
        assert!(config.api.debug);
        assert_eq!(config.points.rounding, RoundingMode::Ceil);
        assert_eq!(config.points.ratio, "2:1");
        assert!(config.has_credentials());
    }

    #[test]
    fn test_api_key_is_masked_in_debug_output() {
        let mut config = LoyaltyConfig::default();
        config.api.api_key = "abcd-very-secret".into();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("abcd****"));
        assert_eq!(mask_secret("abc"), "****");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("loyaltydog.toml");

        let mut config = LoyaltyConfig::default();
        config.api.program_id = "program-7".into();
        config.points.write_review_points = 15;
        config.messages.redeem_offer = String::new();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[api]"));
        assert!(contents.contains("[points]"));

        let loaded: LoyaltyConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.api.program_id, "program-7");
        assert_eq!(loaded.points.write_review_points, 15);
        assert!(loaded.messages.redeem_offer.is_empty());
    }
}
