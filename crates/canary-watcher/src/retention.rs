//! Retention keys, weak tracking handles, and the structures shared by all
//! confirmation attempts.
//!
//! There is no garbage collector feeding a reference queue here: `Arc` drops
//! are deterministic, so a handle's referent is released exactly when its
//! `Weak` no longer upgrades. The observation queue is therefore realized as
//! a sweep: [`ObservationQueue::drain`] removes and returns every handle
//! whose referent has been dropped. Draining is the only path that removes
//! keys from the retained set.

use dashmap::DashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Weak;
use std::time::Instant;
use uuid::Uuid;

/// Unique token identifying one watch call.
///
/// A fresh key is generated per watch call, even for the same object, so a
/// key unambiguously names one observation instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetentionKey(String);

impl RetentionKey {
    /// Generate a fresh random key (uuid v4 rendered as a string).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RetentionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-owning handle to a watched object.
///
/// Holds a `Weak` reference so it never prevents the referent from being
/// dropped. Carries the retention key, an optional human-readable name, and
/// the instant the watch started.
pub struct TrackedHandle {
    key: RetentionKey,
    name: String,
    referent: Weak<dyn Any + Send + Sync>,
    watched_at: Instant,
}

impl TrackedHandle {
    pub fn new(
        key: RetentionKey,
        name: impl Into<String>,
        referent: Weak<dyn Any + Send + Sync>,
        watched_at: Instant,
    ) -> Self {
        Self {
            key,
            name: name.into(),
            referent,
            watched_at,
        }
    }

    pub fn key(&self) -> &RetentionKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn watched_at(&self) -> Instant {
        self.watched_at
    }

    /// Whether the referent has been dropped by its true owner.
    pub fn is_released(&self) -> bool {
        self.referent.strong_count() == 0
    }
}

impl fmt::Debug for TrackedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedHandle")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Table of live tracking handles, drained as their referents are released.
#[derive(Default)]
pub struct ObservationQueue {
    handles: Mutex<Vec<TrackedHandle>>,
}

impl ObservationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle for observation.
    pub fn register(&self, handle: TrackedHandle) {
        self.handles.lock().push(handle);
    }

    /// Remove and return every handle whose referent has been released.
    ///
    /// Handles registered concurrently with a drain may or may not be seen
    /// by that drain; they are picked up by the next one.
    pub fn drain(&self) -> Vec<TrackedHandle> {
        let mut handles = self.handles.lock();
        let mut released = Vec::new();
        let mut i = 0;
        while i < handles.len() {
            if handles[i].is_released() {
                released.push(handles.swap_remove(i));
            } else {
                i += 1;
            }
        }
        released
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}

/// Concurrent set of retention keys still considered possibly alive.
///
/// Inserts happen on watch-calling threads; removals happen on whichever
/// thread drains the observation queue.
#[derive(Default)]
pub struct RetainedKeys {
    keys: DashSet<RetentionKey>,
}

impl RetainedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: RetentionKey) {
        self.keys.insert(key);
    }

    pub fn remove(&self, key: &RetentionKey) {
        self.keys.remove(key);
    }

    pub fn contains(&self, key: &RetentionKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
