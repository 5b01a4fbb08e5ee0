//! Authenticated session persisted through the token store

use crate::error::CoreResult;
use crate::storage::{Persistence, TokenStore};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const ACCESS_TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const TOKEN_EXPIRES_KEY: &str = "tokenExpires";
pub const CURRENT_USER_KEY: &str = "user-storage";
pub const SIDEBAR_COLLAPSED_KEY: &str = "sidebarCollapsed";
pub const DARK_MODE_KEY: &str = "darkMode";

/// Lifetime of the access-token cookie unless configured otherwise
pub const DEFAULT_ACCESS_TOKEN_MAX_AGE_SECS: i64 = 3600;

/// Login path used for redirects unless configured otherwise
pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

/// Session view over a [`TokenStore`].
///
/// The access token always lives in a cookie. The refresh token goes to a
/// cookie when the user asked to be remembered and to local storage
/// otherwise; reads look in both.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tokens: TokenStore,
    access_max_age: Duration,
}

impl SessionStore {
    pub fn new(tokens: TokenStore) -> Self {
        Self {
            tokens,
            access_max_age: Duration::seconds(DEFAULT_ACCESS_TOKEN_MAX_AGE_SECS),
        }
    }

    #[must_use]
    pub fn with_access_max_age(mut self, max_age: Duration) -> Self {
        self.access_max_age = max_age;
        self
    }

    pub const fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn store_login(&self, session: &Session, remember_me: bool) -> CoreResult<()> {
        self.update_access_token(&session.access_token, session.expiry)?;

        if let Some(refresh) = &session.refresh_token {
            let (target, stale) = if remember_me {
                (Persistence::Cookie, Persistence::Local)
            } else {
                (Persistence::Local, Persistence::Cookie)
            };
            self.tokens.save(REFRESH_TOKEN_KEY, refresh, target)?;
            self.tokens.remove(REFRESH_TOKEN_KEY, stale)?;
        }

        info!(remember_me, "Session stored");
        Ok(())
    }

    pub fn update_access_token(&self, token: &str, expiry: Option<DateTime<Utc>>) -> CoreResult<()> {
        let max_age = Some(self.access_max_age);
        self.tokens
            .save_with_max_age(ACCESS_TOKEN_KEY, token, Persistence::Cookie, max_age)?;
        match expiry {
            Some(expiry) => self.tokens.save_with_max_age(
                TOKEN_EXPIRES_KEY,
                &expiry,
                Persistence::Cookie,
                max_age,
            ),
            None => self.tokens.remove(TOKEN_EXPIRES_KEY, Persistence::Cookie),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens.get(ACCESS_TOKEN_KEY, Persistence::Cookie)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens
            .get(REFRESH_TOKEN_KEY, Persistence::Cookie)
            .or_else(|| self.tokens.get(REFRESH_TOKEN_KEY, Persistence::Local))
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.tokens.get(TOKEN_EXPIRES_KEY, Persistence::Cookie)
    }

    pub fn session(&self) -> Option<Session> {
        Some(Session {
            access_token: self.access_token()?,
            refresh_token: self.refresh_token(),
            expiry: self.expiry(),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Remove every session key from both media, including the cached user
    pub fn clear(&self) -> CoreResult<()> {
        for key in [ACCESS_TOKEN_KEY, TOKEN_EXPIRES_KEY, REFRESH_TOKEN_KEY] {
            self.tokens.remove(key, Persistence::Cookie)?;
            self.tokens.remove(key, Persistence::Local)?;
        }
        self.tokens.remove(CURRENT_USER_KEY, Persistence::Local)?;
        info!("Session cleared");
        Ok(())
    }

    /// Cache the profile of the signed-in user
    pub fn cache_user<T: Serialize>(&self, user: &T) -> CoreResult<()> {
        self.tokens.save(CURRENT_USER_KEY, user, Persistence::Local)
    }

    pub fn cached_user<T: DeserializeOwned>(&self) -> Option<T> {
        self.tokens.get(CURRENT_USER_KEY, Persistence::Local)
    }

    pub fn preferences(&self) -> UiPreferences {
        UiPreferences {
            sidebar_collapsed: self
                .tokens
                .get(SIDEBAR_COLLAPSED_KEY, Persistence::Local)
                .unwrap_or_default(),
            dark_mode: self
                .tokens
                .get(DARK_MODE_KEY, Persistence::Local)
                .unwrap_or_default(),
        }
    }

    pub fn save_preferences(&self, prefs: UiPreferences) -> CoreResult<()> {
        self.tokens
            .save(SIDEBAR_COLLAPSED_KEY, &prefs.sidebar_collapsed, Persistence::Local)?;
        self.tokens
            .save(DARK_MODE_KEY, &prefs.dark_mode, Persistence::Local)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPreferences {
    pub sidebar_collapsed: bool,
    pub dark_mode: bool,
}

/// Outcome of the navigation guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    RedirectToLogin,
    RedirectHome,
}

/// Anonymous users are sent to the login page; signed-in users never see it.
pub fn guard_route(path: &str, authenticated: bool, login_path: &str) -> RouteDecision {
    let on_login = path == login_path;
    match (authenticated, on_login) {
        (false, false) => RouteDecision::RedirectToLogin,
        (true, true) => RouteDecision::RedirectHome,
        _ => RouteDecision::Proceed,
    }
}
