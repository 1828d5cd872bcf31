//! Client session: stored credentials, lifecycle state and the in-flight
//! refresh placeholder

pub mod store;

pub use store::{
    ACCESS_TOKEN_KEY, FileTokenStore, MemoryTokenStore, REFRESH_TOKEN_KEY, TokenStore,
};

use crate::error::{ClientError, RefreshFailure};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Handle to an outstanding refresh, resolving to the new access token
pub type RefreshHandle = Shared<BoxFuture<'static, Result<String, RefreshFailure>>>;

const EVENT_CAPACITY: usize = 16;

/// Credentials returned by a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: Option<String>,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No credentials; a fresh login is required
    Anonymous,
    /// An access token is present and presumed valid
    Authenticated,
    /// The access token was rejected and one refresh is outstanding
    Refreshing,
    /// Refresh failed; collapses into `Anonymous` once credentials are gone
    ///
    /// Only held while the session is being torn down. [`Session::state`]
    /// never reports it once the termination has returned; observe
    /// [`SessionEvent::Terminated`] instead.
    Expired,
}

/// Notifications for front ends that need to react to session changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    /// The session ended involuntarily and the user must log in again
    Terminated(RefreshFailure),
    LoggedOut,
}

/// Per-client session object
///
/// Owns the token store, the lifecycle state and the single slot holding the
/// in-flight refresh. One `Session` is shared by every request a client makes.
pub struct Session {
    store: Arc<dyn TokenStore>,
    state: Mutex<SessionState>,
    in_flight: Mutex<Option<RefreshHandle>>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    /// Open a session over `store`, resuming it when credentials are present
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let has_credentials = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY].iter().any(|key| {
            store.get(key).unwrap_or_else(|e| {
                warn!("Failed to read {key} from token store: {e}");
                None
            })
            .is_some()
        });

        let state = if has_credentials {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        debug!(?state, "Session opened");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            state: Mutex::new(state),
            in_flight: Mutex::new(None),
            events,
        }
    }

    /// Session with an in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Authenticated | SessionState::Refreshing
        )
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn access_token(&self) -> Result<Option<String>, ClientError> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, ClientError> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    /// Record a successful login
    pub fn begin(&self, tokens: &TokenPair) -> Result<(), ClientError> {
        self.store.set(ACCESS_TOKEN_KEY, &tokens.access)?;
        match &tokens.refresh {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh)?,
            None => self.store.remove(REFRESH_TOKEN_KEY)?,
        }

        self.transition(SessionState::Authenticated);
        info!("Session started");
        self.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    /// Explicit logout; clears every credential
    pub fn end(&self) -> Result<(), ClientError> {
        self.clear_credentials()?;
        self.transition(SessionState::Anonymous);
        info!("Session ended by logout");
        self.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Persist an access token minted with `refresh_used`
    ///
    /// Returns `false` without writing anything if the stored refresh token
    /// changed while the refresh was outstanding (logout or a new login).
    pub(crate) fn accept_refreshed(
        &self,
        refresh_used: &str,
        access: &str,
    ) -> Result<bool, ClientError> {
        if self.refresh_token()?.as_deref() != Some(refresh_used) {
            debug!("Discarding refreshed access token for a superseded session");
            return Ok(false);
        }

        self.store.set(ACCESS_TOKEN_KEY, access)?;
        self.transition(SessionState::Authenticated);
        self.emit(SessionEvent::Refreshed);
        Ok(true)
    }

    /// Terminate the session after an unrecoverable refresh failure
    ///
    /// Passes through `Expired` and ends in `Anonymous` before returning, so
    /// callers see `Anonymous` plus a [`SessionEvent::Terminated`] event.
    pub(crate) fn terminate(&self, reason: &RefreshFailure) {
        self.transition(SessionState::Expired);
        if let Err(e) = self.clear_credentials() {
            warn!("Failed to clear credentials on session termination: {e}");
        }
        self.transition(SessionState::Anonymous);
        warn!("Session terminated: {reason}");
        self.emit(SessionEvent::Terminated(reason.clone()));
    }

    /// Return the outstanding refresh, or install the one built by `start`
    ///
    /// The check and the install happen under one lock, so concurrent callers
    /// can never install two refreshes.
    pub(crate) fn join_or_start_refresh(
        &self,
        start: impl FnOnce() -> BoxFuture<'static, Result<String, RefreshFailure>>,
    ) -> RefreshHandle {
        let mut slot = lock(&self.in_flight);
        if let Some(handle) = slot.as_ref() {
            debug!("Joining in-flight token refresh");
            return handle.clone();
        }

        let handle = start().shared();
        *slot = Some(handle.clone());
        drop(slot);

        self.transition(SessionState::Refreshing);
        handle
    }

    /// Empty the in-flight slot once a refresh has settled
    pub(crate) fn clear_in_flight(&self) {
        lock(&self.in_flight).take();
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    fn clear_credentials(&self) -> Result<(), ClientError> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)
    }

    fn transition(&self, next: SessionState) {
        let mut state = lock(&self.state);
        if *state != next {
            debug!(from = ?*state, to = ?next, "Session state change");
            *state = next;
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::store::MockTokenStore;
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_new_session_state_from_store() {
        let store = MemoryTokenStore::new();
        assert_eq!(
            Session::new(Arc::new(MemoryTokenStore::new())).state(),
            SessionState::Anonymous
        );

        store.set(ACCESS_TOKEN_KEY, "a").unwrap();
        assert_eq!(Session::new(Arc::new(store)).state(), SessionState::Authenticated);
    }

    #[test]
    fn test_begin_and_end() {
        let session = Session::in_memory();
        let mut events = session.subscribe();

        session
            .begin(&TokenPair {
                access: "a1".into(),
                refresh: Some("r1".into()),
            })
            .unwrap();
        assert_eq!(session.state(), SessionState::Authenticated);
        assert_eq!(session.access_token().unwrap().as_deref(), Some("a1"));
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("r1"));
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedIn);

        session.end().unwrap();
        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(session.access_token().unwrap(), None);
        assert_eq!(session.refresh_token().unwrap(), None);
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedOut);
    }

    #[test]
    fn test_terminate_clears_both_keys() {
        let mut store = MockTokenStore::new();
        store.expect_get().returning(|_| Ok(Some("token".into())));
        store
            .expect_remove()
            .with(eq(ACCESS_TOKEN_KEY))
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_remove()
            .with(eq(REFRESH_TOKEN_KEY))
            .times(1)
            .returning(|_| Ok(()));

        let session = Session::new(Arc::new(store));
        let mut events = session.subscribe();
        session.terminate(&RefreshFailure::Rejected(401));

        assert_eq!(session.state(), SessionState::Anonymous);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Terminated(RefreshFailure::Rejected(401))
        );
        assert!(events.try_recv().is_err());
        assert_ne!(session.state(), SessionState::Expired);
    }

    #[test]
    fn test_accept_refreshed_ignores_superseded_session() {
        let session = Session::in_memory();
        session
            .begin(&TokenPair {
                access: "a1".into(),
                refresh: Some("r1".into()),
            })
            .unwrap();

        assert!(!session.accept_refreshed("r0", "a2").unwrap());
        assert_eq!(session.access_token().unwrap().as_deref(), Some("a1"));

        assert!(session.accept_refreshed("r1", "a2").unwrap());
        assert_eq!(session.access_token().unwrap().as_deref(), Some("a2"));
        assert_eq!(session.refresh_token().unwrap().as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_join_or_start_refresh_shares_one_future() {
        let session = Session::in_memory();
        let mut starts = 0;

        let first = session.join_or_start_refresh(|| {
            starts += 1;
            async { Ok("fresh".to_string()) }.boxed()
        });
        let second = session.join_or_start_refresh(|| {
            starts += 1;
            async { Ok("other".to_string()) }.boxed()
        });

        assert_eq!(starts, 1);
        assert_eq!(session.state(), SessionState::Refreshing);
        assert_eq!(first.await.unwrap(), "fresh");
        assert_eq!(second.await.unwrap(), "fresh");

        session.clear_in_flight();
        assert!(!session.is_refreshing());
    }
}
