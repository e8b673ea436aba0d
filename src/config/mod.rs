use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Primary chat-completions provider
    #[serde(default)]
    pub llm_api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Backup provider. An empty key means no backup is configured.
    #[serde(default)]
    pub backup_llm_api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub backup_llm_base_url: String,
    #[serde(default = "default_backup_llm_model")]
    pub backup_llm_model: String,

    /// Per-request timeout enforced by the provider HTTP clients
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Consecutive primary failures before the breaker opens
    #[serde(default = "default_fail_threshold")]
    pub circuit_breaker_fail_threshold: u32,

    /// Seconds the breaker stays open before allowing a probe
    #[serde(default = "default_reset_timeout")]
    pub circuit_breaker_reset_timeout: u64,

    #[serde(default = "default_max_claims")]
    pub max_claims_per_job: usize,

    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Deception scores at or above this are always "Suspicious/Deceptive"
    #[serde(default = "default_deception_high")]
    pub deception_threshold_high: f64,

    /// Deception scores at or above this downgrade "Likely True" to "Mixed"
    #[serde(default = "default_deception_moderate")]
    pub deception_threshold_moderate: f64,

    /// Google Custom Search credentials. Empty disables evidence retrieval.
    #[serde(default)]
    pub google_api_key: String,
    #[serde(default)]
    pub google_cse_id: String,

    /// Search request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub google_search_timeout: f64,

    #[serde(default = "default_search_max_concurrent")]
    pub google_search_max_concurrent: usize,

    /// Comma-separated list or JSON array of allowed origins
    #[serde(default = "default_cors_origins")]
    pub backend_cors_origins: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_backup_llm_model() -> String {
    "gpt-4o".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_fail_threshold() -> u32 {
    5
}

fn default_reset_timeout() -> u64 {
    60
}

fn default_max_claims() -> usize {
    3
}

fn default_job_ttl_secs() -> u64 {
    3600
}

fn default_reaper_interval_secs() -> u64 {
    300
}

fn default_deception_high() -> f64 {
    7.0
}

fn default_deception_moderate() -> f64 {
    5.0
}

fn default_search_timeout() -> f64 {
    10.0
}

fn default_search_max_concurrent() -> usize {
    3
}

fn default_cors_origins() -> String {
    "http://localhost:5173,http://localhost:3000".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Enforce cross-field rules that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let moderate = self.deception_threshold_moderate;
        let high = self.deception_threshold_high;

        if !(0.0..=10.0).contains(&moderate) {
            return Err(ConfigError::Invalid(format!(
                "DECEPTION_THRESHOLD_MODERATE must be between 0 and 10, got {moderate}"
            )));
        }
        if !(0.0..=10.0).contains(&high) {
            return Err(ConfigError::Invalid(format!(
                "DECEPTION_THRESHOLD_HIGH must be between 0 and 10, got {high}"
            )));
        }
        if high <= moderate {
            return Err(ConfigError::Invalid(format!(
                "DECEPTION_THRESHOLD_HIGH ({high}) must be strictly greater than \
                 DECEPTION_THRESHOLD_MODERATE ({moderate})"
            )));
        }

        let at_least_one = [
            ("CIRCUIT_BREAKER_FAIL_THRESHOLD", self.circuit_breaker_fail_threshold as u64),
            ("CIRCUIT_BREAKER_RESET_TIMEOUT", self.circuit_breaker_reset_timeout),
            ("MAX_CLAIMS_PER_JOB", self.max_claims_per_job as u64),
            ("JOB_TTL_SECS", self.job_ttl_secs),
            ("REAPER_INTERVAL_SECS", self.reaper_interval_secs),
            ("GOOGLE_SEARCH_MAX_CONCURRENT", self.google_search_max_concurrent as u64),
        ];
        for (name, value) in at_least_one {
            if value < 1 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be at least 1, got {value}"
                )));
            }
        }

        if self.google_search_timeout.is_nan() || self.google_search_timeout <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "GOOGLE_SEARCH_TIMEOUT must be positive, got {}",
                self.google_search_timeout
            )));
        }

        self.cors_origins()?;
        Ok(())
    }

    pub fn backup_configured(&self) -> bool {
        !self.backup_llm_api_key.is_empty()
    }

    pub fn evidence_configured(&self) -> bool {
        !self.google_api_key.is_empty() && !self.google_cse_id.is_empty()
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_timeout)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.google_search_timeout)
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    /// Allowed CORS origins, accepting either a JSON array or a comma-separated list.
    pub fn cors_origins(&self) -> Result<Vec<String>, ConfigError> {
        parse_cors_origins(&self.backend_cors_origins)
    }
}

fn parse_cors_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let raw = raw.trim();
    if raw.starts_with('[') || raw.starts_with('{') {
        let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
            ConfigError::Invalid(format!(
                "BACKEND_CORS_ORIGINS: invalid JSON - {e}. Offending value: {raw}"
            ))
        })?;
        let serde_json::Value::Array(items) = parsed else {
            return Err(ConfigError::Invalid(format!(
                "BACKEND_CORS_ORIGINS: JSON value must be a list, got: {raw}"
            )));
        };
        return items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(origin) => Ok(origin),
                other => Err(ConfigError::Invalid(format!(
                    "BACKEND_CORS_ORIGINS: expected string entries, got {other}"
                ))),
            })
            .collect();
    }

    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
