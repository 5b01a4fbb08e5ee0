//! Authentication endpoints

use super::error::{ApiError, ErrorType, normalize};
use super::interceptor::{EndReason, SessionClient};
use super::service::{ServiceError, make_service};
use super::{ApiRequest, decode};
use crate::routes;
use crate::types::{
    Acknowledgement, Credentials, Envelope, LoginData, MeData, RefreshData, RefreshRequest,
    UserProfile, parse_timestamp,
};
use signalement_core::{Session, SessionStore};

crate::error_kind! {
    /// Documented failures of `POST /auth/login`
    pub enum LoginErrorKind {
        Unauthorized,
        ValidationError,
        UserNotFound,
        RateLimitError,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `POST /auth/logout`
    pub enum LogoutErrorKind {
        TokenMissing,
        Unauthorized,
        TokenRevocationError,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `POST /auth/refresh`
    pub enum RefreshErrorKind {
        TokenMissing,
        TokenInvalid,
        TokenExpired,
        TokenRevoked,
        InvalidTokenType,
        RootUserRefresh,
        UserNotFound,
        ValidationError,
        ServerError,
    }
}

crate::error_kind! {
    /// Documented failures of `GET /auth/me`
    pub enum MeErrorKind {
        TokenMissing,
        TokenInvalid,
        TokenExpired,
        TokenRevoked,
        UserNotFound,
        ServerError,
    }
}

pub(crate) fn refresh_request(refresh_token: &str) -> Result<ApiRequest, ApiError> {
    ApiRequest::post(routes::REFRESH).json(&RefreshRequest {
        refresh_token: refresh_token.to_string(),
    })
}

/// Store the access token handed out by the refresh endpoint
pub(crate) fn apply_refresh(session: &SessionStore, data: &RefreshData) {
    let expiry = data.expires.as_deref().and_then(parse_timestamp);
    if let Err(e) = session.update_access_token(&data.access_token, expiry) {
        warn!(error = %e, "Failed to store refreshed access token");
    }
}

fn login_session(data: &LoginData) -> Session {
    let tokens = &data.tokens;
    let refresh_token = tokens
        .refresh_token
        .clone()
        .filter(|token| !token.is_empty() && tokens.can_refresh.unwrap_or(true));
    Session {
        access_token: tokens.access_token.clone(),
        refresh_token,
        expiry: tokens.expires.as_deref().and_then(parse_timestamp),
    }
}

impl SessionClient {
    /// Sign in and persist the returned tokens.
    ///
    /// With `remember_me` the refresh token is kept in a cookie; otherwise
    /// it only lives in local storage.
    pub async fn login(
        &self,
        credentials: Credentials,
        remember_me: bool,
    ) -> Result<LoginData, ServiceError<LoginErrorKind>> {
        let service = make_service(
            "Erreur lors de la connexion",
            move |credentials: Credentials| async move {
                let request = ApiRequest::post(routes::LOGIN).json(&credentials)?;
                let body = self.api().send_with_token(&request, None).await?;
                let response: Envelope<LoginData> = decode(body)?;
                let data = response.data;

                let session = self.session();
                let stored = session
                    .clear()
                    .and_then(|()| session.store_login(&login_session(&data), remember_me));
                if let Err(e) = stored {
                    return Err(normalize(e, "Impossible d'enregistrer la session"));
                }

                let profile = UserProfile {
                    id: data.user.id.clone(),
                    nom: data.user.fullname.clone(),
                    numero: String::new(),
                    email: data.user.email.clone(),
                    role: data.user.role,
                };
                if let Err(e) = session.cache_user(&profile) {
                    warn!(error = %e, "Failed to cache signed-in user");
                }

                info!(user = %data.user.email, "Signed in");
                Ok::<_, ApiError>(data)
            },
        );
        service.call(credentials).await
    }

    /// Revoke the session server-side, then drop it locally
    pub async fn logout(&self) -> Result<String, ServiceError<LogoutErrorKind>> {
        let service = make_service("Erreur lors de la déconnexion", move |(): ()| async move {
            let request = ApiRequest::post(routes::LOGOUT).json(&serde_json::json!({}))?;
            let ack: Acknowledgement = self.send(&request).await?;
            self.end_session(EndReason::LoggedOut);
            Ok::<_, ApiError>(ack.message)
        });
        service.call(()).await
    }

    /// Exchange the stored refresh token for a new access token
    pub async fn refresh_token(&self) -> Result<RefreshData, ServiceError<RefreshErrorKind>> {
        let service = make_service(
            "Erreur lors du rafraîchissement du token",
            move |(): ()| async move {
                let Some(refresh_token) = self.session().refresh_token() else {
                    return Err(ApiError::new(
                        401,
                        "Aucun refresh token disponible",
                        ErrorType::TokenMissing,
                    ));
                };
                let request = refresh_request(&refresh_token)?;
                let body = self.api().send_with_token(&request, None).await?;
                let response: Envelope<RefreshData> = decode(body)?;
                apply_refresh(self.session(), &response.data);
                Ok::<_, ApiError>(response.data)
            },
        );
        service.call(()).await
    }

    /// Profile of the signed-in user; refreshes the cached copy
    pub async fn me(&self) -> Result<MeData, ServiceError<MeErrorKind>> {
        let service = make_service(
            "Erreur lors de la récupération du profil",
            move |(): ()| async move {
                let response: Envelope<MeData> = self.send(&ApiRequest::get(routes::ME)).await?;
                if let Err(e) = self.session().cache_user(&response.data.user) {
                    warn!(error = %e, "Failed to cache user profile");
                }
                Ok::<_, ApiError>(response.data)
            },
        );
        service.call(()).await
    }

    /// Profile cached by the last successful login or [`Self::me`]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.session().cached_user()
    }
}
