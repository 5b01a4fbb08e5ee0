//! Configuration validation support

use config::ConfigError;
use serde::{Deserialize, Serialize};

/// Trait for validating configuration values
pub trait ValidateConfig: Serialize + for<'de> Deserialize<'de> {
    /// Returns Ok(()) if valid, or an error describing what's wrong
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Common validation helpers
pub mod validators {
    use config::ConfigError;

    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::Message(format!("{field}: cannot be empty")));
        }
        Ok(())
    }

    /// Validate that a URL parses and uses http or https
    pub fn validate_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ConfigError::Message(format!("{field}: invalid URL - {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::Message(format!(
                "{field}: unsupported scheme '{other}'"
            ))),
        }
    }

    /// Validate an absolute application path such as `/login`
    pub fn validate_app_path(path: &str, field: &str) -> Result<(), ConfigError> {
        if !path.starts_with('/') {
            return Err(ConfigError::Message(format!(
                "{field}: must start with '/'"
            )));
        }
        Ok(())
    }

    /// Validate that a value is within range
    pub fn validate_range<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<(), ConfigError> {
        if value < min || value > max {
            return Err(ConfigError::Message(format!(
                "{field}: must be between {min} and {max}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::validators::*;

    #[test]
    fn http_url_rejects_other_schemes() {
        assert!(validate_http_url("https://artci.api-medev.com", "api.base_url").is_ok());
        assert!(validate_http_url("http://localhost:3000", "api.base_url").is_ok());

        let err = validate_http_url("ftp://example.com", "api.base_url").unwrap_err();
        assert!(err.to_string().contains("api.base_url"));
        assert!(validate_http_url("not a url", "api.base_url").is_err());
    }

    #[test]
    fn app_path_must_be_absolute() {
        assert!(validate_app_path("/login", "session.login_path").is_ok());
        assert!(validate_app_path("login", "session.login_path").is_err());
    }

    #[test]
    fn range_is_inclusive() {
        assert!(validate_range(1, 1, 10, "x").is_ok());
        assert!(validate_range(10, 1, 10, "x").is_ok());
        assert!(validate_range(11, 1, 10, "x").is_err());
    }
}
