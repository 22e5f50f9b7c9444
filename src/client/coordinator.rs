//! Single-flight session refresh.

use reqwest::StatusCode;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::session::SessionCache;
use super::{ApiRequest, ApiResponse, ClientError, REFRESH_PATH, Transport, TransportError};

/// Why a refresh did not produce a new access token.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh rejected with status {status}: {message}")]
    Rejected { status: StatusCode, message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The caller driving the refresh went away before it finished.
    #[error("refresh was abandoned")]
    Abandoned,
}

type Waiter = oneshot::Sender<Result<(), RefreshError>>;

enum RefreshState {
    Idle,
    InFlight { waiters: Vec<Waiter> },
}

/// Returns the state to `Idle` when the leading refresh ends, however it ends.
/// If the leader is dropped before [`finish`](Self::finish), queued waiters
/// see [`RefreshError::Abandoned`].
struct InFlightGuard<'a> {
    state: &'a Mutex<RefreshState>,
    finished: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(state: &'a Mutex<RefreshState>) -> Self {
        Self {
            state,
            finished: false,
        }
    }

    fn finish(mut self, result: &Result<(), RefreshError>) {
        // Once the state is Idle a new round may start; drop must not touch it
        self.finished = true;
        for waiter in take_waiters(self.state) {
            // A waiter whose caller was dropped no longer cares
            let _ = waiter.send(result.clone());
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            take_waiters(self.state);
        }
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take_waiters(state: &Mutex<RefreshState>) -> Vec<Waiter> {
    match std::mem::replace(&mut *lock(state), RefreshState::Idle) {
        RefreshState::InFlight { waiters } => waiters,
        RefreshState::Idle => Vec::new(),
    }
}

/// Sends requests through a [`Transport`] and recovers from expired access
/// tokens with at most one concurrent refresh call.
///
/// A 401 on a request that is not an auth endpoint and has not been replayed
/// yet either starts a refresh or, when one is already running, waits for it.
/// On success every affected request is replayed once. On failure every
/// affected caller gets the error and the session cache is expired.
pub struct RefreshCoordinator<T> {
    transport: T,
    state: Mutex<RefreshState>,
    session: SessionCache,
}

impl<T: Transport> RefreshCoordinator<T> {
    pub fn new(transport: T) -> Self {
        Self::with_session(transport, SessionCache::new())
    }

    pub fn with_session(transport: T, session: SessionCache) -> Self {
        Self {
            transport,
            state: Mutex::new(RefreshState::Idle),
            session,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> &SessionCache {
        &self.session
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*lock(&self.state), RefreshState::InFlight { .. })
    }

    /// Number of callers waiting on the refresh in flight.
    pub fn queued(&self) -> usize {
        match &*lock(&self.state) {
            RefreshState::InFlight { waiters } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Send a request, refreshing the session and replaying once on 401.
    ///
    /// Responses other than a recoverable 401 are returned as-is, whatever
    /// their status.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.transport.send(&request).await?;
        if response.status != StatusCode::UNAUTHORIZED || request.is_refresh_exempt() {
            return Ok(response);
        }
        if request.retried {
            warn!(path = %request.path, "Request rejected again after refresh");
            return Err(ClientError::Unauthorized);
        }

        self.refresh().await?;

        let retry = request.into_retry();
        let response = self.transport.send(&retry).await?;
        if response.status == StatusCode::UNAUTHORIZED {
            warn!(path = %retry.path, "Request rejected again after refresh");
            return Err(ClientError::Unauthorized);
        }
        Ok(response)
    }

    /// Refresh the session, or wait for the refresh already in flight.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        if let Some(waiter) = self.join_in_flight() {
            debug!("Waiting for refresh in flight");
            return waiter.await.unwrap_or(Err(RefreshError::Abandoned));
        }

        let guard = InFlightGuard::new(&self.state);
        let result = self.send_refresh().await;
        guard.finish(&result);

        match &result {
            Ok(()) => debug!("Session refreshed"),
            Err(e) => {
                info!(error = %e, "Session refresh failed, signing out");
                self.session.expire();
            }
        }
        result
    }

    /// Queue behind the refresh in flight, or mark this caller as the leader (None).
    fn join_in_flight(&self) -> Option<oneshot::Receiver<Result<(), RefreshError>>> {
        let mut state = lock(&self.state);
        match &mut *state {
            RefreshState::InFlight { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Some(rx)
            }
            RefreshState::Idle => {
                *state = RefreshState::InFlight {
                    waiters: Vec::new(),
                };
                None
            }
        }
    }

    async fn send_refresh(&self) -> Result<(), RefreshError> {
        let response = self.transport.send(&ApiRequest::post(REFRESH_PATH)).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(RefreshError::Rejected {
                status: response.status,
                message: response.error_message().unwrap_or_default().to_string(),
            })
        }
    }
}
