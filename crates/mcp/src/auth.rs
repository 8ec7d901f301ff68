//! MCP client authentication
//!
//! The remote tool server authenticates callers with a static API key sent in
//! a configurable request header (`X-API-KEY` by default).

use std::fmt;

use reqwest::header::{HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::GatewayError;

pub const MISSING_KEY_MESSAGE: &str =
    "gateway api key is not configured (set HUDDLE_GATEWAY_API_KEY or API_KEY)";

/// Validated header name and secret for the gateway.
#[derive(Clone)]
pub struct GatewayCredentials {
    header_name: HeaderName,
    api_key: SecretString,
}

impl GatewayCredentials {
    /// Fails before any transport exists when the key is absent or blank, or
    /// when either part cannot be carried in an HTTP header.
    pub fn resolve(api_key: Option<&SecretString>, header_name: &str) -> Result<Self, GatewayError> {
        let api_key = api_key
            .filter(|key| !key.expose_secret().trim().is_empty())
            .cloned()
            .ok_or_else(|| GatewayError::Configuration(MISSING_KEY_MESSAGE.to_owned()))?;

        let header_name = HeaderName::from_bytes(header_name.trim().as_bytes()).map_err(|_| {
            GatewayError::Configuration(format!("`{header_name}` is not a valid header name"))
        })?;

        HeaderValue::from_str(api_key.expose_secret()).map_err(|_| {
            GatewayError::Configuration("gateway api key contains invalid header characters".to_owned())
        })?;

        Ok(Self { header_name, api_key })
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    pub(crate) fn header_value(&self) -> Result<HeaderValue, GatewayError> {
        let mut value = HeaderValue::from_str(self.api_key.expose_secret()).map_err(|_| {
            GatewayError::Configuration("gateway api key contains invalid header characters".to_owned())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("header_name", &self.header_name)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{GatewayCredentials, MISSING_KEY_MESSAGE};
    use crate::GatewayError;

    #[test]
    fn missing_key_is_configuration_error() {
        let error = GatewayCredentials::resolve(None, "X-API-KEY").expect_err("missing key");
        assert_eq!(error, GatewayError::Configuration(MISSING_KEY_MESSAGE.to_owned()));
    }

    #[test]
    fn blank_key_is_treated_as_missing() {
        let blank = SecretString::from("   ".to_owned());
        let error = GatewayCredentials::resolve(Some(&blank), "X-API-KEY").expect_err("blank key");
        assert!(error.is_configuration());
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let key = SecretString::from("k-123".to_owned());
        let error = GatewayCredentials::resolve(Some(&key), "X API KEY").expect_err("bad header");
        assert!(error.is_configuration());
    }

    #[test]
    fn debug_output_redacts_key() {
        let key = SecretString::from("super-secret-key".to_owned());
        let credentials = GatewayCredentials::resolve(Some(&key), "X-API-KEY").expect("valid");

        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("super-secret-key"));
        assert!(rendered.contains("x-api-key"));
        assert!(credentials.header_value().expect("value").is_sensitive());
    }
}
