//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

/// What to send as the payload of a request that has no body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyBody {
    /// Send no payload at all.
    #[default]
    Omit,
    /// Send the JSON literal `null`, for services that expect a payload on
    /// every request.
    Null,
}

/// Settings applied to every session created from this configuration.
///
/// Every field is optional when deserialized:
///
/// ```
/// let config: fm_core::ClientConfig =
///     serde_json::from_str(r#"{ "timeout_secs": 30, "empty_body": "null" }"#).unwrap();
/// assert_eq!(config.timeout(), Some(std::time::Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound for a whole call, connect through body read.
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub empty_body: EmptyBody,
}

impl ClientConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.empty_body, EmptyBody::Omit);
        assert!(config.timeout().is_none());
    }

    #[test]
    fn fields_deserialize() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"timeout_secs": 5, "user_agent": "fm-tests/1.0", "empty_body": "null"}"#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.user_agent.as_deref(), Some("fm-tests/1.0"));
        assert_eq!(config.empty_body, EmptyBody::Null);
    }

    #[test]
    fn unknown_empty_body_mode_is_rejected() {
        let result: Result<ClientConfig, _> = serde_json::from_str(r#"{"empty_body": "zero"}"#);
        assert!(result.is_err());
    }
}
