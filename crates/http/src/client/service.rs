//! Typed service factory

use super::error::{ApiError, ErrorType, IntoApiError, normalize};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

/// Error tags an endpoint documents, narrowed from [`ErrorType`]
pub trait ErrorKind: Sized + fmt::Debug {
    fn classify(error_type: &ErrorType) -> Self;
}

/// Declare an endpoint error-kind enum. Variant names must match
/// [`ErrorType`] variants; everything else classifies as `Other`.
#[macro_export]
macro_rules! error_kind {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $($variant,)*
            Other,
        }

        impl $crate::client::service::ErrorKind for $name {
            fn classify(error_type: &$crate::client::error::ErrorType) -> Self {
                match error_type {
                    $($crate::client::error::ErrorType::$variant => Self::$variant,)*
                    _ => Self::Other,
                }
            }
        }
    };
}

/// Failure of a typed service call: the endpoint's kind plus the full error
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError<K> {
    pub kind: K,
    pub error: ApiError,
}

impl<K> ServiceError<K> {
    pub const fn status(&self) -> u16 {
        self.error.status
    }

    pub fn into_inner(self) -> ApiError {
        self.error
    }
}

impl<K: ErrorKind> From<ApiError> for ServiceError<K> {
    fn from(error: ApiError) -> Self {
        Self {
            kind: K::classify(&error.error_type),
            error,
        }
    }
}

impl<K> fmt::Display for ServiceError<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<K: fmt::Debug> std::error::Error for ServiceError<K> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A raw call wrapped so every failure comes out normalized and classified
pub struct TypedService<F, K> {
    default_message: &'static str,
    raw: F,
    _kind: PhantomData<fn() -> K>,
}

/// Wrap `raw`; `default_message` is used when a failure carries no message
pub const fn make_service<F, K>(default_message: &'static str, raw: F) -> TypedService<F, K> {
    TypedService {
        default_message,
        raw,
        _kind: PhantomData,
    }
}

impl<F, K: ErrorKind> TypedService<F, K> {
    pub async fn call<A, T, E, Fut>(&self, args: A) -> Result<T, ServiceError<K>>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IntoApiError,
    {
        (self.raw)(args).await.map_err(|e| {
            let error = normalize(e, self.default_message);
            debug!(
                status = error.status,
                error_type = %error.error_type,
                "{}", self.default_message
            );
            ServiceError::from(error)
        })
    }

    pub const fn default_message(&self) -> &'static str {
        self.default_message
    }
}
