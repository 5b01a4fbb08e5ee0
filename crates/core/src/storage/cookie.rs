//! Cookie jar emulation for the token store

use super::backend::{MemoryStorage, StorageBackend};
use crate::error::CoreResult;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    #[default]
    Strict,
    Lax,
    None,
}

impl SameSite {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Attributes appended to every cookie written by the jar.
///
/// Tokens are never `HttpOnly`: the client reads them back to build the
/// `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookiePolicy {
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self::hardened()
    }
}

impl CookiePolicy {
    /// `Secure; SameSite=Strict`
    pub const fn hardened() -> Self {
        Self {
            secure: true,
            same_site: Some(SameSite::Strict),
        }
    }

    /// Bare `Path=/` cookies, as older deployments expect
    pub const fn legacy() -> Self {
        Self {
            secure: false,
            same_site: None,
        }
    }

    fn write_attributes(&self, out: &mut String) {
        if let Some(same_site) = self.same_site {
            let _ = write!(out, "; SameSite={}", same_site.as_str());
        }
        if self.secure {
            out.push_str("; Secure");
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCookie {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Client-side cookie jar persisted through a [`StorageBackend`].
///
/// Values are stored percent-encoded exactly as they would travel in a
/// `Cookie` header.
#[derive(Debug, Clone)]
pub struct CookieJar {
    backend: Arc<dyn StorageBackend>,
    policy: CookiePolicy,
}

impl CookieJar {
    pub fn new(backend: Arc<dyn StorageBackend>, policy: CookiePolicy) -> Self {
        Self { backend, policy }
    }

    pub fn in_memory(policy: CookiePolicy) -> Self {
        Self::new(Arc::new(MemoryStorage::new()), policy)
    }

    pub const fn policy(&self) -> CookiePolicy {
        self.policy
    }

    /// Write a cookie and return the equivalent `Set-Cookie` header value.
    ///
    /// A `max_age` of zero or less deletes the cookie.
    pub fn set(&self, name: &str, value: &str, max_age: Option<Duration>) -> CoreResult<String> {
        let encoded = urlencoding::encode(value).into_owned();

        let mut header = format!("{name}={encoded}; Path=/");
        if let Some(max_age) = max_age {
            let _ = write!(header, "; Max-Age={}", max_age.num_seconds().max(0));
        }
        self.policy.write_attributes(&mut header);

        match max_age {
            Some(max_age) if max_age <= Duration::zero() => {
                self.backend.remove_item(name)?;
            }
            _ => {
                let stored = StoredCookie {
                    value: encoded,
                    expires_at: max_age.map(|age| Utc::now() + age),
                };
                self.backend
                    .set_item(name, &serde_json::to_string(&stored)?)?;
            }
        }

        debug!(cookie = name, "Cookie written");
        Ok(header)
    }

    /// Decoded value of an unexpired cookie
    pub fn get(&self, name: &str) -> Option<String> {
        let stored = self.stored(name)?;
        urlencoding::decode(&stored.value)
            .map(|value| value.into_owned())
            .ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stored(name).is_some()
    }

    /// Expire a cookie (`Max-Age=0`)
    pub fn remove(&self, name: &str) -> CoreResult<String> {
        self.set(name, "", Some(Duration::zero()))
    }

    /// Render the unexpired cookies as a `Cookie` request header value
    pub fn header_value(&self) -> String {
        let names = self.backend.keys().unwrap_or_default();
        names
            .iter()
            .filter_map(|name| self.stored(name).map(|c| format!("{name}={}", c.value)))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn stored(&self, name: &str) -> Option<StoredCookie> {
        let raw = match self.backend.get_item(name) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(cookie = name, error = %e, "Failed to read cookie");
                return None;
            }
        };
        let stored: StoredCookie = serde_json::from_str(&raw).ok()?;
        if stored.is_expired(Utc::now()) {
            if let Err(e) = self.backend.remove_item(name) {
                warn!(cookie = name, error = %e, "Failed to evict expired cookie");
            }
            return None;
        }
        Some(stored)
    }
}

/// Cookies sent with an incoming request, used in a server-side context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCookies {
    cookies: BTreeMap<String, String>,
}

impl RequestCookies {
    /// Parse a `Cookie` header (`a=1; b=2`). Malformed pairs are skipped.
    pub fn parse(header: &str) -> Self {
        let cookies = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                let value = urlencoding::decode(value.trim()).ok()?;
                Some((name.to_string(), value.into_owned()))
            })
            .collect();
        Self { cookies }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardened_cookie_header_carries_policy() {
        let jar = CookieJar::in_memory(CookiePolicy::hardened());
        let header = jar
            .set("token", "\"a b\"", Some(Duration::seconds(3600)))
            .unwrap();

        assert_eq!(
            header,
            "token=%22a%20b%22; Path=/; Max-Age=3600; SameSite=Strict; Secure"
        );
        assert_eq!(jar.get("token").as_deref(), Some("\"a b\""));
    }

    #[test]
    fn legacy_cookie_is_path_only() {
        let jar = CookieJar::in_memory(CookiePolicy::legacy());
        let header = jar.set("refreshToken", "\"r\"", None).unwrap();
        assert_eq!(header, "refreshToken=%22r%22; Path=/");
        assert!(!header.contains("HttpOnly"));
    }

    #[test]
    fn max_age_zero_removes_cookie() {
        let jar = CookieJar::in_memory(CookiePolicy::default());
        jar.set("token", "\"t\"", None).unwrap();
        assert!(jar.contains("token"));

        let header = jar.remove("token").unwrap();
        assert!(header.contains("Max-Age=0"));
        assert!(!jar.contains("token"));
        assert_eq!(jar.get("token"), None);
    }

    #[test]
    fn expired_cookie_is_not_returned() {
        let jar = CookieJar::in_memory(CookiePolicy::default());
        jar.set("token", "\"t\"", Some(Duration::milliseconds(1))).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(jar.get("token"), None);
        assert_eq!(jar.header_value(), "");
    }

    /// Backend whose removals always fail
    #[derive(Debug, Default)]
    struct StickyStorage(MemoryStorage);

    impl StorageBackend for StickyStorage {
        fn get_item(&self, key: &str) -> CoreResult<Option<String>> {
            self.0.get_item(key)
        }
        fn set_item(&self, key: &str, value: &str) -> CoreResult<()> {
            self.0.set_item(key, value)
        }
        fn remove_item(&self, _key: &str) -> CoreResult<()> {
            Err(crate::error::CoreError::storage("read-only"))
        }
        fn keys(&self) -> CoreResult<Vec<String>> {
            self.0.keys()
        }
    }

    #[test]
    fn expired_cookie_stays_hidden_when_eviction_fails() {
        let jar = CookieJar::new(Arc::new(StickyStorage::default()), CookiePolicy::default());
        jar.set("token", "t", Some(Duration::milliseconds(1))).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(jar.get("token"), None);
        assert!(!jar.contains("token"));
    }

    #[test]
    fn header_value_lists_live_cookies() {
        let jar = CookieJar::in_memory(CookiePolicy::legacy());
        jar.set("a", "1", None).unwrap();
        jar.set("b", "x y", None).unwrap();
        assert_eq!(jar.header_value(), "a=1; b=x%20y");
    }

    #[test]
    fn request_cookies_decode_values() {
        let cookies = RequestCookies::parse("token=%22abc%22; theme=dark; =junk; broken");
        assert_eq!(cookies.get("token"), Some("\"abc\""));
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.get("broken"), None);
    }
}
