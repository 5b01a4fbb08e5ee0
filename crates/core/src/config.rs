//! Client configuration: defaults, optional file, then environment

use crate::error::CoreResult;
use crate::session::{DEFAULT_ACCESS_TOKEN_MAX_AGE_SECS, DEFAULT_LOGIN_PATH};
use crate::storage::{CookiePolicy, SameSite};
use crate::validation::{ValidateConfig, validators};
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Production backend
pub const DEFAULT_BASE_URL: &str = "https://artci.api-medev.com";

/// Prefix of environment overrides, e.g. `SIGNALEMENT__API__BASE_URL`
pub const ENV_PREFIX: &str = "SIGNALEMENT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub api: ApiSettings,
    pub session: SessionSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Backend root, without trailing slash
    pub base_url: String,

    /// Transport timeout in seconds; unset means no timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Where the user is sent when the session ends
    pub login_path: String,

    pub access_token_max_age_secs: i64,

    pub cookie: CookieSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSettings {
    pub secure: bool,
    pub same_site: SameSite,

    /// Write bare `Path=/` cookies, ignoring `secure` and `same_site`
    #[serde(default)]
    pub legacy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            user_agent: concat!("signalement-admin/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            access_token_max_age_secs: DEFAULT_ACCESS_TOKEN_MAX_AGE_SECS,
            cookie: CookieSettings::default(),
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: true,
            same_site: SameSite::Strict,
            legacy: false,
        }
    }
}

impl CookieSettings {
    pub const fn policy(&self) -> CookiePolicy {
        if self.legacy {
            CookiePolicy::legacy()
        } else {
            CookiePolicy {
                secure: self.secure,
                same_site: Some(self.same_site),
            }
        }
    }
}

impl StorageSettings {
    /// Configured directory, or the platform data directory
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("signalement")
        })
    }
}

impl ClientSettings {
    /// Load defaults, then `path` if given, then `SIGNALEMENT__*` variables
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a value has the wrong
    /// type, or the merged settings fail validation
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Same as [`load`](Self::load) with an explicit environment map
    /// instead of the process environment
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("api.base_url", defaults.api.base_url)?
            .set_default("api.user_agent", defaults.api.user_agent)?
            .set_default("session.login_path", defaults.session.login_path)?
            .set_default(
                "session.access_token_max_age_secs",
                defaults.session.access_token_max_age_secs,
            )?
            .set_default("session.cookie.secure", defaults.session.cookie.secure)?
            .set_default("session.cookie.same_site", "strict")?
            .set_default("session.cookie.legacy", defaults.session.cookie.legacy)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        debug!(base_url = %loaded.api.base_url, "Client settings loaded");
        Ok(loaded)
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }
}

impl ValidateConfig for ClientSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        validators::validate_http_url(&self.api.base_url, "api.base_url")?;
        validators::validate_not_empty(&self.api.user_agent, "api.user_agent")?;
        if let Some(timeout) = self.api.timeout_secs {
            validators::validate_range(timeout, 1, 600, "api.timeout_secs")?;
        }
        validators::validate_app_path(&self.session.login_path, "session.login_path")?;
        validators::validate_range(
            self.session.access_token_max_age_secs,
            1,
            30 * 24 * 3600,
            "session.access_token_max_age_secs",
        )?;
        Ok(())
    }
}
