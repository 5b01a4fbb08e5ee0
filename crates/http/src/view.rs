//! Fetch state of a view and the cancellable detail loader

use crate::client::error::ApiError;
use crate::client::interceptor::SessionClient;
use crate::client::service::ServiceError;
use crate::types::SignalementDetail;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Explicit loading/success/error state of one view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Idle,
    Loading,
    Loaded(T),
    /// Fetching again while the previous data stays on screen
    Refetching(T),
    Failed(ApiError),
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> ViewState<T> {
    pub fn begin_fetch(&mut self) {
        *self = match std::mem::take(self) {
            Self::Loaded(data) | Self::Refetching(data) => Self::Refetching(data),
            _ => Self::Loading,
        };
    }

    pub fn resolve(&mut self, result: Result<T, ApiError>) {
        *self = match result {
            Ok(data) => Self::Loaded(data),
            Err(error) => Self::Failed(error),
        };
    }

    /// Drop an in-flight fetch, keeping whatever was loaded before it
    pub fn abandon(&mut self) {
        *self = match std::mem::take(self) {
            Self::Refetching(data) => Self::Loaded(data),
            Self::Loading => Self::Idle,
            other => other,
        };
    }

    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Loaded(data) | Self::Refetching(data) => Some(data),
            _ => None,
        }
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading | Self::Refetching(_))
    }

    pub const fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Whether a finished load made it into the shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// Cancelled or superseded by a newer load
    Discarded,
}

#[derive(Default)]
struct LoaderState {
    view: ViewState<SignalementDetail>,
    generation: u64,
    in_flight: Option<CancellationToken>,
    id: Option<String>,
}

/// Loads one signalement at a time. Starting a load cancels the previous
/// one, and only the latest load may write the state.
#[derive(Clone)]
pub struct DetailLoader {
    client: SessionClient,
    state: Arc<Mutex<LoaderState>>,
}

impl DetailLoader {
    pub fn new(client: SessionClient) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ViewState<SignalementDetail> {
        self.lock().view.clone()
    }

    pub fn current_id(&self) -> Option<String> {
        self.lock().id.clone()
    }

    pub async fn load(&self, id: &str) -> LoadOutcome {
        let (generation, token) = {
            let mut state = self.lock();
            if let Some(previous) = state.in_flight.take() {
                previous.cancel();
            }
            state.generation += 1;
            let token = CancellationToken::new();
            state.in_flight = Some(token.clone());

            if state.id.as_deref() != Some(id) {
                state.view = ViewState::Idle;
                state.id = Some(id.to_string());
            }
            state.view.begin_fetch();
            (state.generation, token)
        };

        let result = tokio::select! {
            () = token.cancelled() => {
                debug!(id, "Detail load cancelled");
                return LoadOutcome::Discarded;
            }
            result = self.client.signalement_detail(id) => result,
        };

        let mut state = self.lock();
        if state.generation != generation {
            debug!(id, "Discarding superseded detail load");
            return LoadOutcome::Discarded;
        }
        state.in_flight = None;
        state.view.resolve(result.map_err(ServiceError::into_inner));
        LoadOutcome::Applied
    }

    /// Load the current id again, keeping its data visible meanwhile
    pub async fn refetch(&self) -> Option<LoadOutcome> {
        let id = self.current_id()?;
        Some(self.load(&id).await)
    }

    /// Abort the in-flight load, if any
    pub fn cancel(&self) {
        let mut state = self.lock();
        if let Some(token) = state.in_flight.take() {
            token.cancel();
            state.generation += 1;
            state.view.abandon();
        }
    }
}
