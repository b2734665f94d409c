//! Profile of the signed-in user, kept in step with the session.
//!
//! Every change of `(authenticated, credential)` is a transition. Leaving the
//! authenticated state clears the profile at once; entering it (or switching
//! credentials while authenticated) starts exactly one `GET /me`. Each fetch
//! is tagged with the transition's sequence number and its result is only
//! stored if no later transition has happened, so the cache reflects the last
//! transition rather than the last response to arrive.

use std::sync::{Arc, Mutex, Weak};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::auth::SessionManager;
use crate::models::UserProfile;
use crate::token::Credential;

const PROFILE_PATH: &str = "/me";

/// What the cache last saw of the session
#[derive(Debug, Clone, PartialEq)]
struct Observed {
    authenticated: bool,
    credential: Option<Credential>,
}

#[derive(Debug, Default)]
struct CacheState {
    sequence: u64,
    observed: Option<Observed>,
    profile: Option<UserProfile>,
}

pub struct ProfileCache {
    session: Arc<SessionManager>,
    state: Mutex<CacheState>,
}

impl ProfileCache {
    pub fn new(session: Arc<SessionManager>) -> Arc<Self> {
        Arc::new(Self {
            session,
            state: Mutex::new(CacheState::default()),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached profile, or `None` whenever the session is not currently
    /// authenticated, even if no transition has been processed yet
    pub fn profile(&self) -> Option<UserProfile> {
        if !self.session.is_authenticated() {
            return None;
        }
        self.lock().profile.clone()
    }

    /// Replace the cached profile, e.g. after the user edited it
    pub fn set(&self, profile: Option<UserProfile>) {
        self.lock().profile = profile;
    }

    pub fn clear(&self) {
        self.set(None);
    }

    /// Current transition sequence number
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    fn observe(&self) -> Observed {
        let state = self.session.state();
        if state.authenticated {
            Observed {
                authenticated: true,
                credential: state.credential,
            }
        } else {
            // Which stale credential is held doesn't matter while logged out
            Observed {
                authenticated: false,
                credential: None,
            }
        }
    }

    /// React to the session's current state.
    ///
    /// Returns the spawned fetch when this call started one. Calling again
    /// without a transition in between does nothing.
    pub fn sync(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let (sequence, credential) = {
            let mut state = self.lock();
            // Observed under the lock so a slower caller can't record an
            // older session state over a newer one
            let observed = self.observe();
            if state.observed.as_ref() == Some(&observed) {
                return None;
            }
            state.sequence += 1;
            if !observed.authenticated {
                debug!(sequence = state.sequence, "Not authenticated, clearing profile");
                state.observed = Some(observed);
                state.profile = None;
                return None;
            }
            let credential = observed.credential.clone();
            state.observed = Some(observed);
            (state.sequence, credential)
        };
        Some(self.spawn_fetch(sequence, credential))
    }

    /// Fetch again for the current state, superseding any fetch in flight.
    /// Does nothing while logged out.
    pub fn refetch(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let (sequence, credential) = {
            let mut state = self.lock();
            let observed = self.observe();
            if !observed.authenticated {
                state.profile = None;
                return None;
            }
            state.sequence += 1;
            let credential = observed.credential.clone();
            state.observed = Some(observed);
            (state.sequence, credential)
        };
        Some(self.spawn_fetch(sequence, credential))
    }

    /// Fetch with the credential seen at the transition, not whatever the
    /// session holds when the task first runs
    fn spawn_fetch(self: &Arc<Self>, sequence: u64, credential: Option<Credential>) -> JoinHandle<()> {
        debug!(sequence, "Fetching profile");
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let result = cache
                .session
                .get_json_with::<UserProfile>(PROFILE_PATH, credential)
                .await;
            cache.apply(sequence, result);
        })
    }

    fn apply(&self, sequence: u64, result: Result<UserProfile, ApiError>) {
        let mut state = self.lock();
        if state.sequence != sequence {
            debug!(sequence, current = state.sequence, "Discarding stale profile response");
            return;
        }
        state.profile = match result {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Failed to fetch profile");
                None
            }
        };
    }

    /// Run `sync` now and after every session login/logout.
    ///
    /// The task holds only a weak reference to the cache and ends once the
    /// cache is dropped; abort the handle to stop it sooner.
    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut changes = self.session.subscribe();
        let cache: Weak<Self> = Arc::downgrade(self);
        self.sync();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.sync();
            }
        })
    }
}
