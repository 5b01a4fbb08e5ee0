//! Token store: typed JSON values over cookies or local storage

mod backend;
mod cookie;

pub use backend::{FileStorage, MemoryStorage, StorageBackend};
pub use cookie::{CookieJar, CookiePolicy, RequestCookies, SameSite};

use crate::error::CoreResult;
use chrono::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Medium a value is persisted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persistence {
    Cookie,
    Local,
}

#[derive(Debug, Clone)]
enum StoreContext {
    /// Interactive client owning its own storage
    Client {
        local: Arc<dyn StorageBackend>,
        cookies: CookieJar,
    },
    /// Rendering on behalf of a request: read-only access to its cookies
    Server { request: RequestCookies },
}

/// Reads and writes JSON-encoded values by key.
///
/// Reads never fail: a missing key, an undecodable cookie, or a value that
/// does not parse as `T` all yield `None`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    context: StoreContext,
}

impl TokenStore {
    pub fn client(local: Arc<dyn StorageBackend>, cookies: CookieJar) -> Self {
        Self {
            context: StoreContext::Client { local, cookies },
        }
    }

    /// Client store kept entirely in memory
    pub fn in_memory(policy: CookiePolicy) -> Self {
        Self::client(Arc::new(MemoryStorage::new()), CookieJar::in_memory(policy))
    }

    /// Server-side store over the cookies of an incoming request
    pub fn server(cookie_header: &str) -> Self {
        Self {
            context: StoreContext::Server {
                request: RequestCookies::parse(cookie_header),
            },
        }
    }

    pub const fn is_server(&self) -> bool {
        matches!(self.context, StoreContext::Server { .. })
    }

    pub fn save<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        persistence: Persistence,
    ) -> CoreResult<()> {
        self.save_with_max_age(key, value, persistence, None)
    }

    /// Like [`save`](Self::save); `max_age` only applies to cookies
    pub fn save_with_max_age<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        persistence: Persistence,
        max_age: Option<Duration>,
    ) -> CoreResult<()> {
        let StoreContext::Client { local, cookies } = &self.context else {
            debug!(key, "Ignoring write in server context");
            return Ok(());
        };

        let json = serde_json::to_string(value)?;
        match persistence {
            Persistence::Cookie => {
                cookies.set(key, &json, max_age)?;
            }
            Persistence::Local => local.set_item(key, &json)?,
        }
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str, persistence: Persistence) -> Option<T> {
        let raw = self.raw(key, persistence)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Discarding unparsable stored value");
                None
            }
        }
    }

    /// Always false in a server context
    pub fn has(&self, key: &str, persistence: Persistence) -> bool {
        match (&self.context, persistence) {
            (StoreContext::Server { .. }, _) => false,
            (StoreContext::Client { cookies, .. }, Persistence::Cookie) => cookies.contains(key),
            (StoreContext::Client { local, .. }, Persistence::Local) => {
                matches!(local.get_item(key), Ok(Some(_)))
            }
        }
    }

    pub fn remove(&self, key: &str, persistence: Persistence) -> CoreResult<()> {
        let StoreContext::Client { local, cookies } = &self.context else {
            debug!(key, "Ignoring removal in server context");
            return Ok(());
        };

        match persistence {
            Persistence::Cookie => {
                cookies.remove(key)?;
            }
            Persistence::Local => local.remove_item(key)?,
        }
        Ok(())
    }

    fn raw(&self, key: &str, persistence: Persistence) -> Option<String> {
        match (&self.context, persistence) {
            (StoreContext::Server { request }, Persistence::Cookie) => {
                request.get(key).map(str::to_string)
            }
            (StoreContext::Server { .. }, Persistence::Local) => None,
            (StoreContext::Client { cookies, .. }, Persistence::Cookie) => cookies.get(key),
            (StoreContext::Client { local, .. }, Persistence::Local) => {
                local.get_item(key).ok().flatten()
            }
        }
    }
}
