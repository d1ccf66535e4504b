use std::env;
use std::time::Duration;

use crate::notifier::WebhookConfig;

pub const DEFAULT_DB_URL: &str = "sqlite:academy.sqlite3";
const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;

/// Process-level settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_url: String,
    pub webhooks: WebhookConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.into(),
            webhooks: WebhookConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `ACADEMY_DB_URL`, `ACADEMY_ENROLLMENT_WEBHOOK_URL`,
    /// `ACADEMY_QUESTION_WEBHOOK_URL` and `ACADEMY_WEBHOOK_TIMEOUT_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        let timeout_secs = get("ACADEMY_WEBHOOK_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECS);

        Self {
            db_url: get("ACADEMY_DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.into()),
            webhooks: WebhookConfig {
                enrollment_created_url: get("ACADEMY_ENROLLMENT_WEBHOOK_URL"),
                question_posted_url: get("ACADEMY_QUESTION_WEBHOOK_URL"),
                timeout: Duration::from_secs(timeout_secs),
            },
        }
    }
}
