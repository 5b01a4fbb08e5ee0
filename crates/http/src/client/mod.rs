//! Signalement API client

pub mod auth;
pub mod dashboard;
pub mod error;
pub mod interceptor;
pub mod service;
pub mod signalements;

use error::{ApiError, ErrorType, normalize};
use reqwest::{Client, ClientBuilder, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use signalement_core::SessionStore;
use std::time::Duration;

/// Body of an [`ApiRequest`]
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

/// Description of a multipart form, turned into a fresh
/// `reqwest::multipart::Form` for every attempt
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

#[derive(Debug, Clone)]
enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime,
            bytes,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn build(&self) -> Result<reqwest::multipart::Form, reqwest::Error> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file =
                        reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime)?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

/// One call against the backend, replayable after a token refresh
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| normalize(e, "Corps de requête invalide"))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    #[must_use]
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }
}

/// HTTP request core: one request, bearer token, normalized errors
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Send `request` with the access token currently in the store
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let token = self.session.access_token();
        let body = self.send_with_token(request, token.as_deref()).await?;
        decode(body)
    }

    /// Send `request` with an explicit bearer token and return the raw body
    pub async fn send_with_token(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        builder = match &request.body {
            RequestBody::Empty => builder.header(header::CONTENT_TYPE, "application/json"),
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => {
                let form = form
                    .build()
                    .map_err(|e| normalize(e, "Formulaire invalide"))?;
                builder.multipart(form)
            }
        };

        debug!(method = %request.method, path = %request.path, "Sending request");

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;
        let body = parse_body(&text);

        if status.is_success() {
            debug!(status = status.as_u16(), path = %request.path, "Request succeeded");
            Ok(body)
        } else {
            let error = ApiError::from_body(status.as_u16(), &body);
            debug!(
                status = error.status,
                error_type = %error.error_type,
                path = %request.path,
                "Request failed"
            );
            Err(error)
        }
    }
}

/// Empty or non-JSON bodies are treated as `{}`
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

pub(crate) fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        ApiError::new(
            0,
            format!("Réponse inattendue du serveur: {e}"),
            ErrorType::ApiError,
        )
    })
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    session: Option<SessionStore>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the session the bearer token is read from
    pub fn session(mut self, session: SessionStore) -> Self {
        self.session = Some(session);
        self
    }

    /// Set the transport timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL or session was given, or the
    /// transport cannot be initialized
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let base_url = self.base_url.ok_or_else(|| {
            ApiError::new(0, "base_url is required", ErrorType::ApiError)
        })?;
        let session = self
            .session
            .ok_or_else(|| ApiError::new(0, "session is required", ErrorType::ApiError))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| concat!("signalement-admin/", env!("CARGO_PKG_VERSION")).into()),
        );

        let client = client_builder
            .build()
            .map_err(|e| normalize(e, "Impossible d'initialiser le client HTTP"))?;

        Ok(ApiClient {
            client,
            base_url,
            session,
        })
    }
}
