//! Pending-Message Registry
//!
//! Owns every outbound message between successful submission to the stack
//! and its delivery acknowledgment (or shutdown). All access goes through a
//! single mutex around an insertion-ordered queue.
//!
//! Stack callbacks may arrive on contexts that must not block. Those callers
//! use [`LockMode::NonBlocking`]: if the lock is held the lookup is abandoned
//! with [`SidError::Busy`] instead of waiting.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use tracing::{error, warn};

use crate::errors::{SidError, SidResult};
use crate::types::{MessageId, PendingMessage};

// ----------------------------------------------------------------------------
// Lock Acquisition Mode
// ----------------------------------------------------------------------------

/// How a registry operation acquires the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Wait until the lock is free (ordinary thread context)
    Blocking,
    /// Give up immediately if the lock is held (constrained context)
    NonBlocking,
}

// ----------------------------------------------------------------------------
// Pending Messages
// ----------------------------------------------------------------------------

/// Thread-safe owner of in-flight message buffers, keyed by message id
#[derive(Debug, Default)]
pub struct PendingMessages {
    entries: Mutex<VecDeque<PendingMessage>>,
}

impl PendingMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message; the registry owns it from here on
    ///
    /// Identifiers are unique among live entries. A message whose id is already
    /// present is rejected with [`SidError::InvalidArgs`] and released.
    pub fn insert(&self, message: PendingMessage) -> SidResult<()> {
        let mut entries = self.lock_blocking();
        if entries.iter().any(|entry| entry.id() == message.id()) {
            error!("Pending message id {} already registered", message.id());
            return Err(SidError::InvalidArgs);
        }
        entries.push_back(message);
        Ok(())
    }

    /// Remove the first message with the given id and hand it to the caller
    pub fn take_by_id(&self, id: MessageId, mode: LockMode) -> SidResult<PendingMessage> {
        let mut entries = match mode {
            LockMode::Blocking => self.lock_blocking(),
            LockMode::NonBlocking => match self.entries.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    error!("Failed to lock mutex for message list (id {})", id);
                    return Err(SidError::Busy);
                }
            },
        };

        let position = entries
            .iter()
            .position(|entry| entry.id() == id)
            .ok_or(SidError::NotFound)?;

        entries.remove(position).ok_or(SidError::NotFound)
    }

    /// Remove and return every entry, in insertion order
    pub fn drain_all(&self) -> Vec<PendingMessage> {
        self.lock_blocking().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock_blocking().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_blocking().is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.lock_blocking().iter().any(|entry| entry.id() == id)
    }

    /// Identifiers of all live entries, in insertion order
    pub fn ids(&self) -> Vec<MessageId> {
        self.lock_blocking().iter().map(PendingMessage::id).collect()
    }

    fn lock_blocking(&self) -> MutexGuard<'_, VecDeque<PendingMessage>> {
        self.entries.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("Pending message list lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    #[cfg(test)]
    fn hold_lock(&self) -> MutexGuard<'_, VecDeque<PendingMessage>> {
        self.lock_blocking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageType, OutboundMessage};
    use proptest::prelude::*;

    fn pending(id: MessageId, data: &[u8]) -> PendingMessage {
        let mut message = OutboundMessage::new(MessageType::Notify, data.to_vec());
        message.desc.id = id;
        PendingMessage::duplicate(&message).unwrap()
    }

    #[test]
    fn take_is_idempotent() {
        let registry = PendingMessages::new();
        registry.insert(pending(7, b"hello")).unwrap();

        let taken = registry.take_by_id(7, LockMode::Blocking).unwrap();
        assert_eq!(taken.payload(), b"hello");
        assert_eq!(
            registry.take_by_id(7, LockMode::Blocking),
            Err(SidError::NotFound)
        );
    }

    #[test]
    fn take_unknown_id_leaves_registry_untouched() {
        let registry = PendingMessages::new();
        registry.insert(pending(1, b"a")).unwrap();
        registry.insert(pending(2, b"b")).unwrap();

        assert_eq!(
            registry.take_by_id(3, LockMode::NonBlocking),
            Err(SidError::NotFound)
        );
        assert_eq!(registry.ids(), vec![1, 2]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let registry = PendingMessages::new();
        registry.insert(pending(5, b"first")).unwrap();

        assert_eq!(registry.insert(pending(5, b"second")), Err(SidError::InvalidArgs));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.take_by_id(5, LockMode::Blocking).unwrap().payload(),
            b"first"
        );
    }

    #[test]
    fn non_blocking_take_gives_up_when_locked() {
        let registry = PendingMessages::new();
        registry.insert(pending(9, b"x")).unwrap();

        let guard = registry.hold_lock();
        assert_eq!(
            registry.take_by_id(9, LockMode::NonBlocking),
            Err(SidError::Busy)
        );
        drop(guard);

        assert!(registry.take_by_id(9, LockMode::NonBlocking).is_ok());
    }

    #[test]
    fn drain_returns_everything_in_order() {
        let registry = PendingMessages::new();
        for id in [4, 2, 8] {
            registry.insert(pending(id, &[id as u8])).unwrap();
        }

        let drained: Vec<_> = registry.drain_all().iter().map(PendingMessage::id).collect();
        assert_eq!(drained, vec![4, 2, 8]);
        assert!(registry.is_empty());
        assert!(registry.drain_all().is_empty());
    }

    proptest! {
        #[test]
        fn ids_stay_unique(ids in proptest::collection::vec(0u16..32, 0..64)) {
            let registry = PendingMessages::new();
            for id in &ids {
                let _ = registry.insert(pending(*id, b"p"));
            }

            let mut live = registry.ids();
            let count = live.len();
            live.sort_unstable();
            live.dedup();
            prop_assert_eq!(live.len(), count);
        }

        #[test]
        fn absent_lookup_is_a_no_op(ids in proptest::collection::btree_set(0u16..100, 0..20), probe in 100u16..200) {
            let registry = PendingMessages::new();
            for id in &ids {
                registry.insert(pending(*id, b"p")).unwrap();
            }
            let before = registry.ids();

            prop_assert_eq!(registry.take_by_id(probe, LockMode::Blocking), Err(SidError::NotFound));
            prop_assert_eq!(registry.ids(), before);
        }
    }
}
