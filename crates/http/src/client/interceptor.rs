//! Refresh-and-retry handling of expired sessions

use super::auth::{apply_refresh, refresh_request};
use super::error::{ApiError, ErrorType};
use super::{ApiClient, ApiRequest, decode};
use crate::types::{Envelope, RefreshData};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use signalement_core::SessionStore;
use signalement_core::session::DEFAULT_LOGIN_PATH;
use std::sync::{Arc, Mutex, PoisonError};

/// Why the session was torn down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Expired access token and nothing to refresh it with
    MissingRefreshToken,
    /// The refresh endpoint rejected the refresh token
    RefreshFailed(ErrorType),
    /// 401 that a refresh cannot fix
    Unauthorized(ErrorType),
    LoggedOut,
}

/// Delivered to the [`SessionListener`] once the tokens are cleared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnded {
    pub reason: EndReason,
    /// Login entry point the user should be sent to
    pub redirect_to: String,
}

/// Receives session teardown notifications, typically to navigate to login
#[cfg_attr(test, mockall::automock)]
pub trait SessionListener: Send + Sync {
    fn session_ended(&self, event: &SessionEnded);
}

/// Listener that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl SessionListener for NoopListener {
    fn session_ended(&self, event: &SessionEnded) {
        debug!(reason = ?event.reason, "Session ended");
    }
}

#[derive(Debug, Clone)]
enum RefreshFailure {
    MissingToken,
    Rejected(ApiError),
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshFailure>>>;

struct Inner {
    api: ApiClient,
    listener: Arc<dyn SessionListener>,
    login_path: String,
    refresh: Mutex<Option<RefreshFuture>>,
}

/// Client that refreshes an expired access token once and replays the call.
///
/// Concurrent calls failing on the same expired token share one refresh.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    pub fn new(api: ApiClient) -> Self {
        Self::with_listener(api, Arc::new(NoopListener), DEFAULT_LOGIN_PATH)
    }

    pub fn with_listener(
        api: ApiClient,
        listener: Arc<dyn SessionListener>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                listener,
                login_path: login_path.into(),
                refresh: Mutex::new(None),
            }),
        }
    }

    /// Get a reference to the inner client (use sparingly - prefer wrapped methods)
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn session(&self) -> &SessionStore {
        self.inner.api.session()
    }

    pub fn login_path(&self) -> &str {
        &self.inner.login_path
    }

    /// Execute a request and handle auth errors
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        decode(self.send_value(request).await?)
    }

    pub async fn send_value(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let token = self.session().access_token();
        let error = match self.inner.api.send_with_token(request, token.as_deref()).await {
            Ok(body) => return Ok(body),
            Err(error) => error,
        };

        if error.status != 401 {
            return Err(error);
        }

        if !error.is_token_expired() {
            warn!(error_type = %error.error_type, "Unauthorized, ending session");
            self.end_session(EndReason::Unauthorized(error.error_type.clone()));
            return Err(error);
        }

        let current = self.session().access_token();
        if current.is_none() && token.is_some() {
            debug!(path = %request.path, "Session already ended, not refreshing");
            return Err(error);
        }
        if current.is_some() && current != token {
            debug!(path = %request.path, "Token already refreshed, retrying");
            return self
                .inner
                .api
                .send_with_token(request, current.as_deref())
                .await;
        }

        match self.refresh_once().await {
            Ok(fresh) => {
                debug!(path = %request.path, "Retrying after refresh");
                self.inner.api.send_with_token(request, Some(&fresh)).await
            }
            Err(RefreshFailure::MissingToken) => Err(error),
            Err(RefreshFailure::Rejected(refresh_error)) => Err(refresh_error),
        }
    }

    /// Clear both tokens and notify the listener
    pub fn end_session(&self, reason: EndReason) {
        self.inner.end_session(reason);
    }

    async fn refresh_once(&self) -> Result<String, RefreshFailure> {
        let pending = {
            let mut slot = self
                .inner
                .refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let pending = async move { inner.refresh_access_token().await }
                        .boxed()
                        .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut slot = self
            .inner
            .refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&pending)) {
            *slot = None;
        }
        result
    }
}

impl Inner {
    async fn refresh_access_token(&self) -> Result<String, RefreshFailure> {
        let Some(refresh_token) = self.api.session().refresh_token() else {
            warn!("Access token expired and no refresh token is stored");
            self.end_session(EndReason::MissingRefreshToken);
            return Err(RefreshFailure::MissingToken);
        };

        let outcome = match refresh_request(&refresh_token) {
            Ok(request) => self
                .api
                .send_with_token(&request, None)
                .await
                .and_then(decode::<Envelope<RefreshData>>),
            Err(error) => Err(error),
        };

        match outcome {
            Ok(response) => {
                apply_refresh(self.api.session(), &response.data);
                info!("Access token refreshed");
                Ok(response.data.access_token)
            }
            Err(error) => {
                warn!(status = error.status, error_type = %error.error_type, "Token refresh failed");
                self.end_session(EndReason::RefreshFailed(error.error_type.clone()));
                Err(RefreshFailure::Rejected(error))
            }
        }
    }

    fn end_session(&self, reason: EndReason) {
        if let Err(e) = self.api.session().clear() {
            warn!(error = %e, "Failed to clear session");
        }
        let event = SessionEnded {
            reason,
            redirect_to: self.login_path.clone(),
        };
        self.listener.session_ended(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalement_core::{CookiePolicy, Session, TokenStore};

    fn client(listener: MockSessionListener) -> SessionClient {
        let session = SessionStore::new(TokenStore::in_memory(CookiePolicy::default()));
        session
            .store_login(
                &Session {
                    access_token: "a".into(),
                    refresh_token: Some("r".into()),
                    expiry: None,
                },
                true,
            )
            .unwrap();
        let api = ApiClient::builder()
            .base_url("http://127.0.0.1:1")
            .session(session)
            .build()
            .unwrap();
        SessionClient::with_listener(api, Arc::new(listener), "/login")
    }

    #[test]
    fn end_session_clears_tokens_and_notifies() {
        let mut listener = MockSessionListener::new();
        listener
            .expect_session_ended()
            .withf(|event| event.reason == EndReason::LoggedOut && event.redirect_to == "/login")
            .times(1)
            .return_const(());

        let client = client(listener);
        assert!(client.session().is_authenticated());

        client.end_session(EndReason::LoggedOut);
        assert!(!client.session().is_authenticated());
        assert_eq!(client.session().refresh_token(), None);
    }
}
