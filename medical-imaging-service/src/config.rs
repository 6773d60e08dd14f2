use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_INFERENCE_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_CONTACT_RECIPIENT: &str = "contact@medai-assistant.com";
pub const DEFAULT_CONTACT_SENDER: &str = "noreply@medai-assistant.com";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("PORT must be a number between 1 and 65535, got '{0}'")]
    InvalidPort(String),
}

/// Configuration for the service, read once at startup
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// Without a key every analysis is served from the fallback report
    pub openrouter_api_key: Option<String>,
    pub inference_model: String,
    /// PostgreSQL store when set, in-memory otherwise
    pub database_url: Option<String>,
    /// Demo mailer when unset
    pub sendgrid_api_key: Option<String>,
    pub contact_recipient: String,
    pub contact_sender: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => return Err(ConfigError::InvalidPort(raw)),
            },
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            openrouter_api_key: non_empty("OPENROUTER_API_KEY"),
            inference_model: non_empty("INFERENCE_MODEL")
                .unwrap_or_else(|| DEFAULT_INFERENCE_MODEL.to_string()),
            database_url: non_empty("DATABASE_URL"),
            sendgrid_api_key: non_empty("SENDGRID_API_KEY"),
            contact_recipient: non_empty("CONTACT_RECIPIENT")
                .unwrap_or_else(|| DEFAULT_CONTACT_RECIPIENT.to_string()),
            contact_sender: non_empty("CONTACT_SENDER")
                .unwrap_or_else(|| DEFAULT_CONTACT_SENDER.to_string()),
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            openrouter_api_key: None,
            inference_model: DEFAULT_INFERENCE_MODEL.to_string(),
            database_url: None,
            sendgrid_api_key: None,
            contact_recipient: DEFAULT_CONTACT_RECIPIENT.to_string(),
            contact_sender: DEFAULT_CONTACT_SENDER.to_string(),
        }
    }
}
