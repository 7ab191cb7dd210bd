//! Authoritative holder of the three current threat levels.
//!
//! A single mutex guards all three values. Updates are rare and UI-driven,
//! so one lock is enough; the critical section covers only the
//! compare-and-assign and is never held while listeners run.
//!
//! Flushes to persistent configuration go through a second lock
//! ([`LevelStore::with_latest`]): the snapshot is taken inside it, so the
//! last flush to complete always carries the latest committed values.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::level::{
    FriendsThreatLevel, NetworkThreatLevel, PhysicalThreatLevel, ThreatDimension, ThreatLevel,
};

/// Current value of every dimension. Never partially set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelsSnapshot {
    /// Network threat level.
    #[serde(rename = "networkThreatLevel")]
    pub network: NetworkThreatLevel,
    /// Friends threat level.
    #[serde(rename = "friendsThreatLevel")]
    pub friends: FriendsThreatLevel,
    /// Physical threat level.
    #[serde(rename = "physicalThreatLevel")]
    pub physical: PhysicalThreatLevel,
}

impl Default for LevelsSnapshot {
    fn default() -> Self {
        Self {
            network: NetworkThreatLevel::DEFAULT,
            friends: FriendsThreatLevel::DEFAULT,
            physical: PhysicalThreatLevel::DEFAULT,
        }
    }
}

impl LevelsSnapshot {
    /// Canonical name of the value held for `dimension`.
    #[must_use]
    pub fn name_of(&self, dimension: ThreatDimension) -> &'static str {
        match dimension {
            ThreatDimension::Network => self.network.name(),
            ThreatDimension::Friends => self.friends.name(),
            ThreatDimension::Physical => self.physical.name(),
        }
    }
}

/// Mutex-guarded store of the current levels.
#[derive(Debug, Default)]
pub struct LevelStore {
    levels: Mutex<LevelsSnapshot>,
    flush: Mutex<()>,
}

impl LevelStore {
    /// Creates a store holding `initial`.
    #[must_use]
    pub fn new(initial: LevelsSnapshot) -> Self {
        Self {
            levels: Mutex::new(initial),
            flush: Mutex::new(()),
        }
    }

    /// Current value of dimension `T`.
    pub fn get<T: ThreatLevel>(&self) -> T {
        T::read(&self.lock())
    }

    /// Canonical name of the current value of `dimension`.
    pub fn get_text(&self, dimension: ThreatDimension) -> &'static str {
        self.lock().name_of(dimension)
    }

    /// Copy of all three current values.
    pub fn snapshot(&self) -> LevelsSnapshot {
        *self.lock()
    }

    /// Replaces the value of dimension `T` and returns the previous one.
    ///
    /// The lock is released before this returns; callers notify listeners
    /// afterwards.
    pub fn apply<T: ThreatLevel>(&self, new_value: T) -> T {
        let mut levels = self.lock();
        let old_value = T::read(&levels);
        T::write(&mut levels, new_value);
        old_value
    }

    /// Runs `flush` on a snapshot taken while holding the flush lock.
    ///
    /// Concurrent flushes are serialized and each one reads the store only
    /// once it owns the lock, so a flush can never overwrite newer values
    /// with an older snapshot. The levels lock is not held while `flush`
    /// runs.
    pub fn with_latest<R>(&self, flush: impl FnOnce(&LevelsSnapshot) -> R) -> R {
        let _flushing = self.flush.lock().unwrap_or_else(PoisonError::into_inner);
        let levels = self.snapshot();
        flush(&levels)
    }

    // The guarded data is three `Copy` values written in one assignment,
    // so a poisoned lock still holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, LevelsSnapshot> {
        self.levels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_holds_initial_values() {
        let store = LevelStore::default();
        assert_eq!(store.get::<NetworkThreatLevel>(), NetworkThreatLevel::Normal);
        assert_eq!(store.get::<FriendsThreatLevel>(), FriendsThreatLevel::Normal);
        assert_eq!(store.get::<PhysicalThreatLevel>(), PhysicalThreatLevel::Normal);
    }

    #[test]
    fn apply_returns_replaced_value() {
        let store = LevelStore::default();

        let old = store.apply(NetworkThreatLevel::High);
        assert_eq!(old, NetworkThreatLevel::Normal);

        let old = store.apply(NetworkThreatLevel::Low);
        assert_eq!(old, NetworkThreatLevel::High);
        assert_eq!(store.get_text(ThreatDimension::Network), "LOW");
    }

    #[test]
    fn apply_only_touches_its_dimension() {
        let store = LevelStore::default();
        store.apply(PhysicalThreatLevel::Low);

        let snap = store.snapshot();
        assert_eq!(snap.physical, PhysicalThreatLevel::Low);
        assert_eq!(snap.network, NetworkThreatLevel::Normal);
        assert_eq!(snap.friends, FriendsThreatLevel::Normal);
    }

    #[test]
    fn with_latest_sees_values_applied_before_it() {
        let store = LevelStore::default();
        store.apply(NetworkThreatLevel::Low);

        let flushed = store.with_latest(|levels| {
            // The levels lock is free while flushing.
            assert_eq!(store.get::<FriendsThreatLevel>(), FriendsThreatLevel::Normal);
            *levels
        });
        assert_eq!(flushed.network, NetworkThreatLevel::Low);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let store = std::sync::Arc::new(LevelStore::default());
        let cloned = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = cloned.levels.lock().unwrap();
            panic!("poison the store");
        })
        .join();

        assert_eq!(store.apply(FriendsThreatLevel::High), FriendsThreatLevel::Normal);
        assert_eq!(store.get::<FriendsThreatLevel>(), FriendsThreatLevel::High);
    }
}
