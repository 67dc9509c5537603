//! Configuration types.
//!
//! Everything is read from the environment with defaults suitable for a
//! local single-node deployment.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Upper bound for any cadence threshold, roughly a century.
pub const MAX_CADENCE_HOURS: f64 = 876_000.0;

/// Thresholds for the cadence and SLA checks, all in hours.
#[derive(Debug, Clone)]
pub struct CadenceConfig {
    /// Pending approvals older than this are nudged.
    pub sla_hours: f64,
    /// Matters in docs_pending older than this get a document reminder.
    pub doc_reminder_hours: f64,
    /// Minimum gap between two document reminders for the same matter.
    pub doc_reminder_cooldown_hours: f64,
    /// Matter age before the first WhatsApp reminder.
    pub whatsapp_first_hours: f64,
    /// Matter age before the second WhatsApp reminder.
    pub whatsapp_second_hours: f64,
    /// Minimum gap between two WhatsApp reminders for the same matter.
    pub whatsapp_cooldown_hours: f64,
    /// Hard cap on WhatsApp reminders per matter.
    pub whatsapp_max_reminders: u32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            sla_hours: 4.0,
            doc_reminder_hours: 48.0,
            doc_reminder_cooldown_hours: 24.0,
            whatsapp_first_hours: 24.0,
            whatsapp_second_hours: 48.0,
            whatsapp_cooldown_hours: 12.0,
            whatsapp_max_reminders: 2,
        }
    }
}

/// Text-generation settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// OpenAI key. `None` means only the template generator is used.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
        }
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub cadence: CadenceConfig,
    pub llm: LlmSettings,
    /// Directory of extra agent definition YAML files.
    pub agent_definitions_dir: Option<PathBuf>,
    /// JSON file holding lead routing rules.
    pub routing_rules_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/legalops.db"),
            port: 8080,
            cadence: CadenceConfig::default(),
            llm: LlmSettings::default(),
            agent_definitions_dir: None,
            routing_rules_path: None,
        }
    }
}

impl AppConfig {
    /// Build the configuration from `LEGALOPS_*` and `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cadence = CadenceConfig {
            sla_hours: env_hours("LEGALOPS_SLA_HOURS", defaults.cadence.sla_hours)?,
            doc_reminder_hours: env_hours(
                "LEGALOPS_DOC_REMINDER_HOURS",
                defaults.cadence.doc_reminder_hours,
            )?,
            doc_reminder_cooldown_hours: env_hours(
                "LEGALOPS_DOC_REMINDER_COOLDOWN_HOURS",
                defaults.cadence.doc_reminder_cooldown_hours,
            )?,
            whatsapp_first_hours: env_hours(
                "LEGALOPS_WHATSAPP_FIRST_HOURS",
                defaults.cadence.whatsapp_first_hours,
            )?,
            whatsapp_second_hours: env_hours(
                "LEGALOPS_WHATSAPP_SECOND_HOURS",
                defaults.cadence.whatsapp_second_hours,
            )?,
            whatsapp_cooldown_hours: env_hours(
                "LEGALOPS_WHATSAPP_COOLDOWN_HOURS",
                defaults.cadence.whatsapp_cooldown_hours,
            )?,
            whatsapp_max_reminders: env_or(
                "LEGALOPS_WHATSAPP_MAX_REMINDERS",
                defaults.cadence.whatsapp_max_reminders,
            )?,
        };

        let llm = LlmSettings {
            api_key: env_opt("OPENAI_API_KEY").map(SecretString::from),
            model: env_opt("LEGALOPS_MODEL").unwrap_or(defaults.llm.model),
            base_url: env_opt("LEGALOPS_OPENAI_BASE_URL").unwrap_or(defaults.llm.base_url),
            ..defaults.llm
        };

        Ok(Self {
            db_path: env_opt("LEGALOPS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            port: env_or("LEGALOPS_PORT", defaults.port)?,
            cadence,
            llm,
            agent_definitions_dir: env_opt("LEGALOPS_AGENT_DEFINITIONS_DIR").map(PathBuf::from),
            routing_rules_path: env_opt("LEGALOPS_ROUTING_RULES").map(PathBuf::from),
        })
    }
}

/// Non-empty value of an environment variable.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Like [`env_or`], for an hour threshold.
fn env_hours(key: &str, default: f64) -> Result<f64, ConfigError> {
    check_hours(key, env_or(key, default)?)
}

/// Hour thresholds must be finite and within `0..=MAX_CADENCE_HOURS`.
fn check_hours(key: &str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=MAX_CADENCE_HOURS).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{value} is not between 0 and {MAX_CADENCE_HOURS} hours"),
        })
    }
}
