//! Once-per-model session memoization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;

use super::ModelKind;

/// Shared handle to a cached session.
pub type SharedSession<S> = Arc<Mutex<S>>;

/// Maps each model to the single session created for it.
///
/// Lookup and creation run under one lock, so concurrent callers never build
/// two sessions for the same model. Entries live until the cache is dropped.
#[derive(Debug)]
pub struct SessionCache<S> {
    sessions: Mutex<HashMap<ModelKind, SharedSession<S>>>,
}

impl<S> SessionCache<S> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the session for `kind`, creating it with `init` on first use.
    ///
    /// A failed `init` leaves the cache unchanged, so a later call may retry.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `init`.
    pub fn get_or_try_init<F>(&self, kind: ModelKind, init: F) -> Result<SharedSession<S>>
    where
        F: FnOnce() -> Result<S>,
    {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(session) = sessions.get(&kind) {
            return Ok(Arc::clone(session));
        }

        tracing::debug!("Creating session for {kind}");
        let session = Arc::new(Mutex::new(init()?));
        sessions.insert(kind, Arc::clone(&session));
        Ok(session)
    }

    /// Whether a session for `kind` exists.
    #[must_use]
    pub fn contains(&self, kind: ModelKind) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&kind)
    }

    /// Number of cached sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S> Default for SessionCache<S> {
    fn default() -> Self {
        Self::new()
    }
}
