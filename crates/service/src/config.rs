use std::time::Duration;

use crmflow_core::error::CoreError;
use validator::Validate;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Workflow service configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, Validate)]
pub struct ServiceConfig {
    /// Base URL of the workflow collaborator, without trailing slash.
    #[validate(url)]
    pub api_url: String,
    /// Per-request timeout in seconds (default: `30`).
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,
    /// Optional bearer token sent with every request.
    pub api_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            api_token: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                        |
    /// |--------------------------------|--------------------------------|
    /// | `CRMFLOW_API_URL`              | `http://localhost:3000/api/v1` |
    /// | `CRMFLOW_REQUEST_TIMEOUT_SECS` | `30`                           |
    /// | `CRMFLOW_API_TOKEN`            | unset                          |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from `lookup`, so
    /// tests do not have to touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let api_url = lookup("CRMFLOW_API_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.into());

        let request_timeout_secs = match lookup("CRMFLOW_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                CoreError::Validation(format!(
                    "CRMFLOW_REQUEST_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let api_token = lookup("CRMFLOW_API_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let config = Self {
            api_url,
            request_timeout_secs,
            api_token,
        };
        config
            .validate()
            .map_err(|e| CoreError::Validation(format!("Invalid service configuration: {e}")))?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("CRMFLOW_API_URL", "https://crm.example.com/api/"),
            ("CRMFLOW_REQUEST_TIMEOUT_SECS", " 5 "),
            ("CRMFLOW_API_TOKEN", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://crm.example.com/api");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn malformed_timeout_is_a_validation_error() {
        let result =
            ServiceConfig::from_lookup(lookup(&[("CRMFLOW_REQUEST_TIMEOUT_SECS", "soon")]));
        assert_matches!(result, Err(CoreError::Validation(msg)) if msg.contains("soon"));
    }

    #[test]
    fn out_of_range_timeout_is_rejected() {
        let result = ServiceConfig::from_lookup(lookup(&[("CRMFLOW_REQUEST_TIMEOUT_SECS", "0")]));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let result = ServiceConfig::from_lookup(lookup(&[("CRMFLOW_API_URL", "not a url")]));
        assert_matches!(result, Err(CoreError::Validation(_)));
    }
}
