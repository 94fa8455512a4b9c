use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AssistantError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub meeting: MeetingConfig,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Label applied to emails the assistant has handled; listing excludes it.
    #[serde(default = "default_processed_label")]
    pub processed_label: String,
    /// Cap on emails fetched per run; unset means provider default.
    #[serde(default)]
    pub max_results: Option<u32>,
    /// Truncation applied to message bodies at ingestion.
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            processed_label: default_processed_label(),
            max_results: None,
            body_limit: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingConfig {
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,
    #[serde(default = "default_num_suggestions")]
    pub num_suggestions: usize,
    /// Used when the calendar settings and USER_TZ are both unavailable.
    #[serde(default = "default_fallback_timezone")]
    pub fallback_timezone: String,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_duration_minutes(),
            num_suggestions: default_num_suggestions(),
            fallback_timezone: default_fallback_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model used by the single-agent pipeline for every completion.
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-stage models for the multi-agent pipeline.
    #[serde(default = "default_triage_model")]
    pub triage_model: String,
    #[serde(default = "default_draft_model")]
    pub draft_model: String,
    #[serde(default = "default_calendar_model")]
    pub calendar_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            triage_model: default_triage_model(),
            draft_model: default_draft_model(),
            calendar_model: default_calendar_model(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,
    /// Webhook URL; when unset, SLACK_WEBHOOK_URL is consulted at startup.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_notify_enabled(),
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_policy_dir")]
    pub dir: String,
    #[serde(default = "default_policy_top_k")]
    pub top_k: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            dir: default_policy_dir(),
            top_k: default_policy_top_k(),
        }
    }
}

fn default_processed_label() -> String {
    "ai-processed".to_string()
}

fn default_body_limit() -> usize {
    2000
}

fn default_duration_minutes() -> i64 {
    60
}

fn default_num_suggestions() -> usize {
    3
}

fn default_fallback_timezone() -> String {
    "Asia/Kathmandu".to_string()
}

fn default_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_triage_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_draft_model() -> String {
    "gpt-4-turbo".to_string()
}

fn default_calendar_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

fn default_notify_enabled() -> bool {
    true
}

fn default_policy_dir() -> String {
    "policies".to_string()
}

fn default_policy_top_k() -> usize {
    2
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AssistantError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| AssistantError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.meeting.duration_minutes <= 0 {
            return Err(AssistantError::Config(
                "meeting.duration_minutes must be positive".to_string(),
            ));
        }
        if self.meeting.num_suggestions == 0 {
            return Err(AssistantError::Config(
                "meeting.num_suggestions must be at least 1".to_string(),
            ));
        }
        if self.mail.processed_label.trim().is_empty() {
            return Err(AssistantError::Config(
                "mail.processed_label must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.models.temperature) {
            return Err(AssistantError::Config(
                "models.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Webhook URL from config, falling back to the environment.
    pub fn webhook_url(&self) -> Option<String> {
        self.notify
            .webhook_url
            .clone()
            .or_else(|| std::env::var("SLACK_WEBHOOK_URL").ok())
            .filter(|url| !url.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.mail.processed_label, "ai-processed");
        assert_eq!(config.mail.body_limit, 2000);
        assert_eq!(config.meeting.duration_minutes, 60);
        assert_eq!(config.meeting.num_suggestions, 3);
        assert_eq!(config.meeting.fallback_timezone, "Asia/Kathmandu");
        assert_eq!(config.models.model, "gpt-4-turbo");
        assert_eq!(config.policy.top_k, 2);
        assert!(config.notify.enabled);
    }

    #[test]
    fn test_partial_toml_applies_defaults() {
        let toml_str = r#"
            [meeting]
            duration_minutes = 30

            [models]
            triage_model = "gpt-4o"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.meeting.duration_minutes, 30);
        assert_eq!(config.meeting.num_suggestions, 3);
        assert_eq!(config.models.triage_model, "gpt-4o");
        assert_eq!(config.models.draft_model, "gpt-4-turbo");
        assert_eq!(config.mail.processed_label, "ai-processed");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.meeting.duration_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.meeting.num_suggestions = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.models.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.meeting.duration_minutes, config.meeting.duration_minutes);
        assert_eq!(reparsed.mail.processed_label, config.mail.processed_label);
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/config.toml"))
            .await
            .unwrap();
        assert_eq!(config.meeting.duration_minutes, 60);
    }
}
