//! In-process store for shared chat snapshots.
//!
//! Snapshots are keyed by a random id and expire after a fixed TTL. Expired
//! entries are swept lazily on every write; reads never return an expired
//! snapshot even when it has not been swept yet. The store is local to one
//! process, so links only resolve on the instance that created them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::ApiError;
use crate::models::{CreateShareInput, SharedSnapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShareError {
    #[error("A shared conversation needs at least one message")]
    NoMessages,
    #[error("Message {0} has no role")]
    MissingRole(usize),
}

impl From<ShareError> for ApiError {
    fn from(e: ShareError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct ShareStore {
    entries: Arc<RwLock<HashMap<String, SharedSnapshot>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ShareStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    /// Store a snapshot of `input` owned by `tenant_id`.
    pub fn create(&self, tenant_id: &str, input: CreateShareInput) -> Result<SharedSnapshot, ShareError> {
        if input.messages.is_empty() {
            return Err(ShareError::NoMessages);
        }
        if let Some(index) = input.messages.iter().position(|m| m.role.trim().is_empty()) {
            return Err(ShareError::MissingRole(index));
        }

        let now = self.clock.now();
        let snapshot = SharedSnapshot {
            id: Uuid::new_v4().simple().to_string(),
            tenant_id: tenant_id.to_string(),
            title: input
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            messages: input.messages,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let mut entries = self.entries.write().expect("share store lock poisoned");
        let before = entries.len();
        entries.retain(|_, s| s.expires_at > now);
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!("Swept {} expired share snapshots", swept);
        }
        entries.insert(snapshot.id.clone(), snapshot.clone());

        Ok(snapshot)
    }

    /// Look up a live snapshot.
    pub fn get(&self, id: &str) -> Option<SharedSnapshot> {
        let now = self.clock.now();
        let entries = self.entries.read().expect("share store lock poisoned");
        entries.get(id).filter(|s| s.expires_at > now).cloned()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().expect("share store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::SharedMessage;

    fn message(role: &str, content: &str) -> SharedMessage {
        SharedMessage {
            role: role.to_string(),
            content: content.to_string(),
            created_at: None,
        }
    }

    fn input(messages: Vec<SharedMessage>) -> CreateShareInput {
        CreateShareInput {
            title: Some("  Pricing question ".to_string()),
            messages,
        }
    }

    fn store(clock: &ManualClock) -> ShareStore {
        ShareStore::new(Duration::days(7), Arc::new(clock.clone()))
    }

    #[test]
    fn created_snapshot_is_readable() {
        let clock = ManualClock::default();
        let store = store(&clock);

        let snapshot = store
            .create("tenant-1", input(vec![message("user", "hi")]))
            .unwrap();

        assert_eq!(snapshot.id.len(), 32);
        assert_eq!(snapshot.title.as_deref(), Some("Pricing question"));
        assert_eq!(snapshot.expires_at - snapshot.created_at, Duration::days(7));
        assert_eq!(store.get(&snapshot.id), Some(snapshot));
    }

    #[test]
    fn ids_are_unique() {
        let clock = ManualClock::default();
        let store = store(&clock);
        let a = store.create("t", input(vec![message("user", "a")])).unwrap();
        let b = store.create("t", input(vec![message("user", "b")])).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn expired_snapshot_is_hidden_before_sweep() {
        let clock = ManualClock::default();
        let store = store(&clock);
        let snapshot = store
            .create("tenant-1", input(vec![message("user", "hi")]))
            .unwrap();

        clock.advance(Duration::days(7));

        assert!(store.get(&snapshot.id).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn write_sweeps_expired_entries() {
        let clock = ManualClock::default();
        let store = store(&clock);
        store.create("t", input(vec![message("user", "old")])).unwrap();
        clock.advance(Duration::days(3));
        let recent = store.create("t", input(vec![message("user", "newer")])).unwrap();

        clock.advance(Duration::days(5));
        let fresh = store.create("t", input(vec![message("user", "fresh")])).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get(&recent.id).is_some());
        assert!(store.get(&fresh.id).is_some());
    }

    #[test]
    fn rejects_empty_conversations() {
        let clock = ManualClock::default();
        let err = store(&clock).create("t", input(vec![])).unwrap_err();
        assert_eq!(err, ShareError::NoMessages);
    }

    #[test]
    fn rejects_messages_without_role() {
        let clock = ManualClock::default();
        let err = store(&clock)
            .create("t", input(vec![message("user", "hi"), message(" ", "?")]))
            .unwrap_err();
        assert_eq!(err, ShareError::MissingRole(1));
    }

    #[test]
    fn unknown_id_is_none() {
        let clock = ManualClock::default();
        assert!(store(&clock).get("does-not-exist").is_none());
    }
}
