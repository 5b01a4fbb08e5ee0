//! Normalized API errors

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use signalement_core::{CoreError, TransitionError};
use std::collections::BTreeMap;
use std::fmt;

/// Catalog entry for a known error tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: &'static str,
    pub status: u16,
    pub user_action: Option<&'static str>,
}

macro_rules! error_types {
    ($(
        $variant:ident => $tag:literal, $status:literal, $message:literal $(, $action:literal)?;
    )*) => {
        /// Error tag carried by backend error bodies
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum ErrorType {
            $($variant,)*
            /// Tag this client does not know about
            Unknown(String),
        }

        impl ErrorType {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $tag,)*
                    Self::Unknown(tag) => tag,
                }
            }

            pub fn parse(tag: &str) -> Self {
                match tag {
                    $($tag => Self::$variant,)*
                    other => Self::Unknown(other.to_string()),
                }
            }

            pub fn info(&self) -> Option<ErrorInfo> {
                match self {
                    $(Self::$variant => Some(ErrorInfo {
                        message: $message,
                        status: $status,
                        user_action: error_types!(@action $($action)?),
                    }),)*
                    Self::Unknown(_) => None,
                }
            }

            /// Every tag with a catalog entry
            pub fn known() -> impl Iterator<Item = Self> {
                [$(Self::$variant,)*].into_iter()
            }
        }
    };
    (@action) => { None };
    (@action $action:literal) => { Some($action) };
}

error_types! {
    Unauthorized => "UNAUTHORIZED", 401,
        "Vous n'êtes pas autorisé à accéder à cette ressource", "Veuillez vous reconnecter";
    TokenMissing => "TOKEN_MISSING", 401,
        "Token d'authentification manquant", "Veuillez vous reconnecter";
    TokenInvalid => "TOKEN_INVALID", 401,
        "Token d'authentification invalide", "Veuillez vous reconnecter";
    TokenExpired => "TOKEN_EXPIRED", 401,
        "Votre session a expiré", "Veuillez vous reconnecter";
    TokenRevoked => "TOKEN_REVOKED", 401,
        "Votre session a été révoquée", "Veuillez vous reconnecter";
    InvalidTokenType => "INVALID_TOKEN_TYPE", 401,
        "Type de token incorrect", "Veuillez vous reconnecter";
    RootUserRefresh => "ROOT_USER_REFRESH", 401,
        "Les utilisateurs root ne peuvent pas rafraîchir leur token", "Veuillez vous reconnecter";
    TokenRevocationError => "TOKEN_REVOCATION_ERROR", 500,
        "Erreur lors de la révocation du token";
    UserNotFound => "USER_NOT_FOUND", 404,
        "Utilisateur non trouvé";
    Forbidden => "FORBIDDEN", 403,
        "Vous n'avez pas les permissions requises";
    UnauthorizedAccess => "UNAUTHORIZED_ACCESS", 403,
        "Vous n'êtes pas autorisé à accéder à cette ressource";
    UnauthorizedDelete => "UNAUTHORIZED_DELETE", 403,
        "Vous n'êtes pas autorisé à supprimer cette ressource";
    UnauthorizedPrivateComment => "UNAUTHORIZED_PRIVATE_COMMENT", 403,
        "Les citoyens ne peuvent pas créer de commentaires privés";
    ValidationError => "VALIDATION_ERROR", 400,
        "Données invalides", "Veuillez vérifier les informations saisies";
    InvalidDateFormat => "INVALID_DATE_FORMAT", 400,
        "Format de date invalide", "Utilisez le format YYYY-MM-DD";
    InvalidDateRange => "INVALID_DATE_RANGE", 400,
        "Plage de dates invalide", "La date de début doit être antérieure à la date de fin";
    InvalidGroupBy => "INVALID_GROUP_BY", 400,
        "Paramètre de regroupement invalide";
    NotFound => "NOT_FOUND", 404,
        "Ressource non trouvée";
    SignalementNotFound => "SIGNALEMENT_NOT_FOUND", 404,
        "Signalement non trouvé";
    PublicationNotFound => "PUBLICATION_NOT_FOUND", 404,
        "Publication non trouvée";
    CitizenNotFound => "CITIZEN_NOT_FOUND", 404,
        "Citoyen non trouvé";
    AdminNotFound => "ADMIN_NOT_FOUND", 404,
        "Administrateur non trouvé";
    NotificationNotFound => "NOTIFICATION_NOT_FOUND", 404,
        "Notification non trouvée";
    DuplicateEmail => "DUPLICATE_EMAIL", 400,
        "Cet email est déjà utilisé";
    DuplicatePhone => "DUPLICATE_PHONE", 400,
        "Ce numéro de téléphone est déjà utilisé";
    NoStatusChange => "NO_STATUS_CHANGE", 400,
        "Le nouveau statut est identique au statut actuel";
    InvalidStatusTransition => "INVALID_STATUS_TRANSITION", 400,
        "Cette transition de statut n'est pas autorisée";
    NoDocumentsProvided => "NO_DOCUMENTS_PROVIDED", 400,
        "Aucun document fourni";
    NoLinksProvided => "NO_LINKS_PROVIDED", 400,
        "Aucun lien fourni";
    FileSizeExceeded => "FILE_SIZE_EXCEEDED", 400,
        "La taille du fichier dépasse la limite autorisée",
        "Veuillez choisir un fichier de moins de 10 Mo";
    AlreadyFlagged => "ALREADY_FLAGGED", 400,
        "Ce signalement est déjà marqué comme spam";
    NotFlaggedAsSpam => "NOT_FLAGGED_AS_SPAM", 400,
        "Ce signalement n'est pas marqué comme spam";
    RateLimitError => "RATE_LIMIT_ERROR", 429,
        "Trop de tentatives, veuillez réessayer plus tard",
        "Veuillez patienter avant de réessayer";
    ServerError => "SERVER_ERROR", 500,
        "Une erreur inattendue s'est produite",
        "Veuillez réessayer ultérieurement ou contacter le support";
    ApiError => "API_ERROR", 500,
        "Erreur lors de la communication avec le serveur";
    NetworkError => "NETWORK_ERROR", 0,
        "Impossible de joindre le serveur", "Vérifiez votre connexion internet";
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::parse(&tag))
    }
}

/// How the consumer should present an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    RateLimited,
    Server,
    Network,
    Other,
}

/// Every failure surfaced by the client, whatever its origin.
///
/// `status` is 0 for failures that never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{message} (status {status})")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
    pub error_type: ErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const RESERVED_KEYS: [&str; 5] = ["status", "message", "errorType", "errors", "details"];

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>, error_type: ErrorType) -> Self {
        Self {
            status,
            message: message.into(),
            error_type,
            details: None,
            extra: Map::new(),
        }
    }

    /// Failure that never reached the server
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, message, ErrorType::NetworkError)
    }

    #[must_use]
    pub fn with_details(mut self, details: BTreeMap<String, String>) -> Self {
        self.details = Some(details);
        self
    }

    /// Build from a non-success response body.
    ///
    /// The tag and field errors are read from the top level or from `data`.
    pub fn from_body(status: u16, body: &Value) -> Self {
        let empty = Map::new();
        let obj = body.as_object().unwrap_or(&empty);
        let data = obj.get("data").and_then(Value::as_object);
        let lookup = |key: &str| {
            obj.get(key)
                .or_else(|| data.and_then(|data| data.get(key)))
                .filter(|value| !value.is_null())
        };

        // A tagged body is already normalized and keeps its message as is
        let tagged = obj.contains_key("errorType");
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| tagged || !message.is_empty())
            .map_or_else(|| format!("HTTP error {status}"), str::to_string);

        let error_type = lookup("errorType")
            .and_then(Value::as_str)
            .map_or(ErrorType::ApiError, ErrorType::parse);

        let details = lookup("errors")
            .or_else(|| lookup("details"))
            .and_then(field_errors);

        let extra = obj
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            status,
            message,
            error_type,
            details,
            extra,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match (self.status, &self.error_type) {
            (0, _) | (_, ErrorType::NetworkError) => ErrorCategory::Network,
            (400, _) => ErrorCategory::Validation,
            (401, _) => ErrorCategory::Authentication,
            (403, _) => ErrorCategory::Authorization,
            (404, _) => ErrorCategory::NotFound,
            (429, _) => ErrorCategory::RateLimited,
            (500..=599, _) => ErrorCategory::Server,
            _ => ErrorCategory::Other,
        }
    }

    /// False only when the session itself is gone
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Authentication)
    }

    /// Worth offering a retry to the user
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::NotFound
                | ErrorCategory::RateLimited
                | ErrorCategory::Server
                | ErrorCategory::Network
        )
    }

    pub fn is_token_expired(&self) -> bool {
        self.status == 401 && self.error_type == ErrorType::TokenExpired
    }

    /// Server message, or the catalog message for the tag
    pub fn user_message(&self) -> &str {
        if !self.message.is_empty() {
            return &self.message;
        }
        self.error_type
            .info()
            .map_or("Une erreur inattendue s'est produite", |info| info.message)
    }

    pub fn user_action(&self) -> Option<&'static str> {
        self.error_type.info().and_then(|info| info.user_action)
    }

    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.details.as_ref()?.get(field).map(String::as_str)
    }
}

fn field_errors(value: &Value) -> Option<BTreeMap<String, String>> {
    let errors: BTreeMap<String, String> = value
        .as_object()?
        .iter()
        .map(|(field, message)| {
            let message = message
                .as_str()
                .map_or_else(|| message.to_string(), str::to_string);
            (field.clone(), message)
        })
        .collect();
    (!errors.is_empty()).then_some(errors)
}

/// Conversion of any failure into an [`ApiError`]
pub trait IntoApiError {
    fn into_api_error(self, default_message: &str) -> ApiError;
}

/// Normalize `err`, falling back to `default_message` when it carries none
pub fn normalize<E: IntoApiError>(err: E, default_message: &str) -> ApiError {
    err.into_api_error(default_message)
}

fn foreign(message: Option<String>, default_message: &str) -> ApiError {
    let message = message
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| default_message.to_string());
    ApiError::network(message)
}

impl IntoApiError for ApiError {
    fn into_api_error(self, _default_message: &str) -> ApiError {
        self
    }
}

impl IntoApiError for reqwest::Error {
    fn into_api_error(self, default_message: &str) -> ApiError {
        foreign(Some(self.to_string()), default_message)
    }
}

impl IntoApiError for serde_json::Error {
    fn into_api_error(self, default_message: &str) -> ApiError {
        foreign(Some(self.to_string()), default_message)
    }
}

impl IntoApiError for std::io::Error {
    fn into_api_error(self, default_message: &str) -> ApiError {
        foreign(Some(self.to_string()), default_message)
    }
}

impl IntoApiError for CoreError {
    fn into_api_error(self, default_message: &str) -> ApiError {
        foreign(Some(self.to_string()), default_message)
    }
}

impl IntoApiError for Value {
    /// Objects with a numeric `status` and a string `message` are already
    /// normalized and pass through.
    fn into_api_error(self, default_message: &str) -> ApiError {
        let status = self
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok());
        let has_message = self.get("message").is_some_and(Value::is_string);

        match status {
            Some(status) if has_message => ApiError::from_body(status, &self),
            _ => {
                let message = self
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                foreign(message, default_message)
            }
        }
    }
}

impl IntoApiError for String {
    fn into_api_error(self, default_message: &str) -> ApiError {
        let mut error = foreign(None, default_message);
        error.extra.insert("error".into(), Value::String(self));
        error
    }
}

impl IntoApiError for &str {
    fn into_api_error(self, default_message: &str) -> ApiError {
        self.to_string().into_api_error(default_message)
    }
}

impl<E: IntoApiError> IntoApiError for Option<E> {
    fn into_api_error(self, default_message: &str) -> ApiError {
        match self {
            Some(err) => err.into_api_error(default_message),
            None => foreign(None, default_message),
        }
    }
}

impl IntoApiError for TransitionError {
    fn into_api_error(self, _default_message: &str) -> ApiError {
        let mut error = ApiError::new(400, self.to_string(), ErrorType::parse(self.error_tag()));
        if let Some((field, message)) = self.field_error() {
            error.details = Some(BTreeMap::from([(field.to_string(), message)]));
        }
        error
    }
}
