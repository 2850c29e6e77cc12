use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub llm: LLMConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub abuse: AbuseConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            temperature: 0.7,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_ms: 15_000,
            max_retries: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Identity that is immune to bans and may use the admin surface
    pub owner_id: String,
    /// Turn pairs kept per surface; the log holds twice this many turns
    pub max_history: usize,
    pub user_turn_chars: usize,
    pub assistant_turn_chars: usize,
    pub history_char_budget: usize,
    pub obfuscate_rules: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            owner_id: "owner".to_string(),
            max_history: 10,
            user_turn_chars: 500,
            assistant_turn_chars: 1200,
            history_char_budget: 6000,
            obfuscate_rules: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 30_000,
            capacity: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AbuseConfig {
    pub ban_threshold: usize,
    pub window_ms: u64,
    pub ban_duration_ms: u64,
}

impl Default for AbuseConfig {
    fn default() -> Self {
        Self {
            ban_threshold: 5,
            window_ms: 10 * 60 * 1000,
            ban_duration_ms: 24 * 60 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub sweep_interval_ms: u64,
    pub idle_expiry_ms: u64,
    pub rules_path: Option<PathBuf>,
    pub rules_poll_interval_ms: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 10 * 60 * 1000,
            idle_expiry_ms: 2 * 60 * 60 * 1000,
            rules_path: None,
            rules_poll_interval_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Text-classification inference endpoint; regex tiers only when unset
    pub endpoint: Option<String>,
    pub threshold: f32,
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            threshold: 0.85,
            timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn api_key() -> Result<String> {
        env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))
    }

    pub fn classifier_token() -> Option<String> {
        env::var("CLASSIFIER_API_TOKEN").ok().filter(|t| !t.is_empty())
    }
}

impl LLMConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl AbuseConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn ban_duration(&self) -> Duration {
        Duration::from_millis(self.ban_duration_ms)
    }
}

impl MaintenanceConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn idle_expiry(&self) -> Duration {
        Duration::from_millis(self.idle_expiry_ms)
    }

    pub fn rules_poll_interval(&self) -> Duration {
        Duration::from_millis(self.rules_poll_interval_ms)
    }
}
