//! CLI configuration and client wiring

use anyhow::{Context, Result};
use chrono::Duration;
use signalement_core::validation::ValidateConfig;
use signalement_core::{ClientSettings, CookieJar, FileStorage, SessionStore, TokenStore};
use signalement_http::{ApiClient, EndReason, SessionClient, SessionEnded, SessionListener};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCAL_STORAGE_FILE: &str = "local-storage.json";
const COOKIE_JAR_FILE: &str = "cookies.json";

/// Load settings, letting command-line flags win over file and environment
pub fn load_settings(
    path: Option<&Path>,
    data_dir: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<ClientSettings> {
    let mut settings = ClientSettings::load(path).context("Failed to load configuration")?;

    if let Some(dir) = data_dir {
        settings.storage.data_dir = Some(dir);
    }
    if let Some(url) = base_url {
        settings.api.base_url = url;
        settings.validate()?;
    }

    Ok(settings)
}

/// Session store persisted as two JSON files under the data directory
pub fn session_store(settings: &ClientSettings) -> SessionStore {
    let dir = settings.storage.resolved_data_dir();
    let local = Arc::new(FileStorage::new(dir.join(LOCAL_STORAGE_FILE)));
    let cookies = CookieJar::new(
        Arc::new(FileStorage::new(dir.join(COOKIE_JAR_FILE))),
        settings.session.cookie.policy(),
    );

    SessionStore::new(TokenStore::client(local, cookies))
        .with_access_max_age(Duration::seconds(settings.session.access_token_max_age_secs))
}

pub fn build_client(settings: &ClientSettings) -> Result<SessionClient> {
    let mut builder = ApiClient::builder()
        .base_url(settings.base_url())
        .session(session_store(settings))
        .user_agent(settings.api.user_agent.clone());
    if let Some(secs) = settings.api.timeout_secs {
        builder = builder.timeout(std::time::Duration::from_secs(secs));
    }
    let api = builder.build()?;

    Ok(SessionClient::with_listener(
        api,
        Arc::new(TerminalListener),
        settings.session.login_path.clone(),
    ))
}

/// Tells the operator to sign in again once the session is gone
struct TerminalListener;

impl SessionListener for TerminalListener {
    fn session_ended(&self, event: &SessionEnded) {
        match &event.reason {
            EndReason::LoggedOut => {}
            reason => {
                tracing::warn!(?reason, redirect = %event.redirect_to, "Session ended");
                eprintln!("Session expirée. Reconnectez-vous avec `signalement login`.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalement_core::{Persistence, Session};

    #[test]
    fn flags_override_loaded_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(
            None,
            Some(dir.path().to_path_buf()),
            Some("http://localhost:4000/".into()),
        )
        .unwrap();

        assert_eq!(settings.base_url(), "http://localhost:4000");
        assert_eq!(settings.storage.resolved_data_dir(), dir.path());
    }

    #[test]
    fn invalid_base_url_flag_is_rejected() {
        assert!(load_settings(None, None, Some("localhost".into())).is_err());
    }

    #[test]
    fn session_survives_a_new_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = ClientSettings::default();
        settings.storage.data_dir = Some(dir.path().to_path_buf());

        session_store(&settings)
            .store_login(
                &Session {
                    access_token: "a".into(),
                    refresh_token: Some("r".into()),
                    expiry: None,
                },
                false,
            )
            .unwrap();

        let reopened = session_store(&settings);
        assert_eq!(reopened.access_token().as_deref(), Some("a"));
        assert_eq!(
            reopened.tokens().get::<String>("refreshToken", Persistence::Local).as_deref(),
            Some("r")
        );
        assert!(dir.path().join(COOKIE_JAR_FILE).exists());
    }
}
