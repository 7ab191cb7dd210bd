//! Validated text bridge between one threat dimension and the config framework.
//!
//! The external configuration framework only speaks text: it reads the
//! current value, lists the allowed values to render a choice, and writes a
//! new value back. [`ChangeAdapter`] does that for one dimension, generic over
//! its [`ThreatLevel`] domain, and owns the commit sequence:
//!
//! ```text
//! set(text) ─ parse ─▶ LevelStore::apply (locked) ─▶ notify listeners ─▶ persist
//!              │
//!              └─ InvalidValue (nothing changes)
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PersistentConfig;
use crate::error::SecurityLevelError;
use crate::level::{ThreatDimension, ThreatLevel, DEFAULT_LEVEL_NAME};
use crate::level_store::LevelStore;
use crate::listener::{ListenerHandle, ListenerRegistry};

/// How a level option is presented to the configuration framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDescriptor {
    /// Dimension behind the option.
    pub dimension: ThreatDimension,
    /// Config key, e.g. `networkThreatLevel`.
    pub key: &'static str,
    /// Text used when nothing is stored.
    pub default_value: &'static str,
    /// Position among the security level options.
    pub sort_order: usize,
    /// Only shown in expert mode.
    pub expert: bool,
    /// Always written out, even when equal to the default.
    pub force_write: bool,
    /// Localisation key of the short description.
    pub short_desc_key: String,
    /// Localisation key of the long description.
    pub long_desc_key: String,
    /// Allowed values in declaration order.
    pub possible_values: Vec<&'static str>,
}

impl OptionDescriptor {
    fn for_dimension(dimension: ThreatDimension) -> Self {
        let key = dimension.config_key();
        Self {
            dimension,
            key,
            default_value: DEFAULT_LEVEL_NAME,
            sort_order: ThreatDimension::ALL
                .iter()
                .position(|d| *d == dimension)
                .unwrap_or_default(),
            expert: false,
            force_write: true,
            short_desc_key: format!("SecurityLevels.{key}Short"),
            long_desc_key: format!("SecurityLevels.{key}"),
            possible_values: dimension.possible_values(),
        }
    }
}

/// Validated getter/setter for dimension `T`.
pub struct ChangeAdapter<T: ThreatLevel> {
    store: Arc<LevelStore>,
    listeners: ListenerRegistry<T>,
    config: Arc<dyn PersistentConfig>,
}

impl<T: ThreatLevel> ChangeAdapter<T> {
    /// Creates the adapter for `T` over a shared store and config collaborator.
    pub fn new(store: Arc<LevelStore>, config: Arc<dyn PersistentConfig>) -> Self {
        Self {
            store,
            listeners: ListenerRegistry::new(),
            config,
        }
    }

    /// Canonical name of the current value.
    pub fn get(&self) -> &'static str {
        self.value().name()
    }

    /// Current typed value.
    pub fn value(&self) -> T {
        self.store.get::<T>()
    }

    /// Every member of `T`, in declaration order.
    pub fn possible_values(&self) -> Vec<&'static str> {
        T::DIMENSION.possible_values()
    }

    /// Option metadata for the configuration framework.
    pub fn option(&self) -> OptionDescriptor {
        OptionDescriptor::for_dimension(T::DIMENSION)
    }

    /// Registers a listener for this dimension. See [`ListenerRegistry::add_listener`].
    pub fn add_listener(&self, listener: ListenerHandle<T>) -> bool {
        self.listeners.add_listener(listener)
    }

    /// Parses `text` and commits it.
    ///
    /// # Errors
    ///
    /// [`SecurityLevelError::InvalidValue`] if `text` is not an exact member
    /// name; nothing is changed, notified or persisted.
    /// [`SecurityLevelError::ListenerFailures`] if the change was committed
    /// but some listeners failed.
    pub fn set(&self, text: &str) -> Result<(), SecurityLevelError> {
        let new_value = T::parse(text).ok_or_else(|| SecurityLevelError::InvalidValue {
            dimension: T::DIMENSION,
            value: text.to_string(),
        })?;
        self.set_value(new_value)
    }

    /// Commits `new_value`: apply under the store lock, then notify every
    /// listener with the applied `(old, new)` pair, then flush configuration.
    ///
    /// # Errors
    ///
    /// [`SecurityLevelError::ListenerFailures`] if some listeners failed. The
    /// change stays committed and the remaining listeners were still invoked.
    pub fn set_value(&self, new_value: T) -> Result<(), SecurityLevelError> {
        let old_value = self.store.apply(new_value);
        info!(
            dimension = %T::DIMENSION,
            old = %old_value,
            new = %new_value,
            "threat level changed"
        );

        let errors = self.listeners.notify_all(old_value, new_value);
        self.persist();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SecurityLevelError::ListenerFailures {
                dimension: T::DIMENSION,
                applied: new_value.name(),
                errors,
            })
        }
    }

    fn persist(&self) {
        let flushed = self
            .store
            .with_latest(|levels| self.config.persist_change(levels));
        if let Err(err) = flushed {
            warn!(dimension = %T::DIMENSION, error = ?err, "failed to persist security levels");
        }
    }
}

impl<T: ThreatLevel> fmt::Debug for ChangeAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeAdapter")
            .field("dimension", &T::DIMENSION)
            .field("value", &self.value())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

/// Reads the stored value of `T`, falling back to the default when the
/// stored text is missing or not a member of the domain.
pub(crate) fn load_initial<T: ThreatLevel>(config: &dyn PersistentConfig) -> T {
    let key = T::DIMENSION.config_key();
    match config.read_initial(key) {
        None => T::DEFAULT,
        Some(text) => T::parse(&text).unwrap_or_else(|| {
            warn!(
                key,
                stored = %text,
                fallback = %T::DEFAULT,
                "stored threat level is not valid, using default"
            );
            T::DEFAULT
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use proptest::prelude::*;

    use crate::config::{MemoryConfig, SecurityLevelsConfig};
    use crate::level::{FriendsThreatLevel, NetworkThreatLevel, PhysicalThreatLevel};
    use crate::listener::listener_fn;

    fn adapter<T: ThreatLevel>() -> (ChangeAdapter<T>, Arc<MemoryConfig>) {
        let config = Arc::new(MemoryConfig::default());
        let adapter = ChangeAdapter::new(Arc::new(LevelStore::default()), config.clone());
        (adapter, config)
    }

    fn roundtrip_all<T: ThreatLevel>() {
        let (adapter, _) = adapter::<T>();
        for member in T::MEMBERS {
            adapter.set(member.name()).expect("valid member");
            assert_eq!(adapter.value(), *member);
            assert_eq!(adapter.get(), member.name());
        }
    }

    #[test]
    fn every_member_roundtrips() {
        roundtrip_all::<NetworkThreatLevel>();
        roundtrip_all::<FriendsThreatLevel>();
        roundtrip_all::<PhysicalThreatLevel>();
    }

    #[test]
    fn invalid_value_leaves_state_untouched() {
        let (adapter, config) = adapter::<NetworkThreatLevel>();
        let calls = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&calls);
        adapter.add_listener(listener_fn(move |_old, _new| {
            *counter.lock().unwrap() += 1;
            Ok(())
        }));

        let err = adapter.set("not-a-real-value").unwrap_err();
        assert!(err.is_rejected());
        assert!(matches!(
            err,
            SecurityLevelError::InvalidValue { dimension: ThreatDimension::Network, ref value }
                if value == "not-a-real-value"
        ));
        assert_eq!(adapter.value(), NetworkThreatLevel::Normal);
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(config.flush_count(), 0);
    }

    #[test]
    fn physical_rejects_high() {
        let (adapter, _) = adapter::<PhysicalThreatLevel>();
        assert!(adapter.set("HIGH").is_err());
        assert_eq!(adapter.possible_values(), ["NORMAL", "LOW"]);
    }

    #[test]
    fn set_notifies_then_persists_once() {
        let (adapter, config) = adapter::<NetworkThreatLevel>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let cfg = Arc::clone(&config);
        adapter.add_listener(listener_fn(move |old, new| {
            // Not yet flushed while listeners run.
            log.lock().unwrap().push((old, new, cfg.flush_count()));
            Ok(())
        }));

        adapter.set("HIGH").expect("set HIGH");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(NetworkThreatLevel::Normal, NetworkThreatLevel::High, 0)]
        );
        assert_eq!(config.flush_count(), 1);
        assert_eq!(
            config.last_persisted().map(|l| l.network),
            Some(NetworkThreatLevel::High)
        );
    }

    #[test]
    fn listener_failure_keeps_the_change() {
        let (adapter, config) = adapter::<FriendsThreatLevel>();
        let after = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&after);

        adapter.add_listener(listener_fn(|_old, _new| Err(anyhow::anyhow!("listener broke"))));
        adapter.add_listener(listener_fn(move |_old, _new| {
            *flag.lock().unwrap() = true;
            Ok(())
        }));

        let err = adapter.set("LOW").unwrap_err();
        match err {
            SecurityLevelError::ListenerFailures {
                dimension,
                applied,
                ref errors,
            } => {
                assert_eq!(dimension, ThreatDimension::Friends);
                assert_eq!(applied, "LOW");
                assert_eq!(errors.len(), 1);
            }
            SecurityLevelError::InvalidValue { .. } => panic!("unexpected {err:?}"),
        }
        assert!(!err.is_rejected());
        assert_eq!(adapter.value(), FriendsThreatLevel::Low);
        assert!(*after.lock().unwrap());
        assert_eq!(config.flush_count(), 1);
    }

    #[test]
    fn listener_can_read_the_new_value() {
        let store = Arc::new(LevelStore::default());
        let adapter: ChangeAdapter<NetworkThreatLevel> =
            ChangeAdapter::new(Arc::clone(&store), Arc::new(MemoryConfig::default()));
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let reader = Arc::clone(&store);

        adapter.add_listener(listener_fn(move |_old, _new| {
            *slot.lock().unwrap() = Some(reader.get::<NetworkThreatLevel>());
            Ok(())
        }));
        adapter.set("LOW").expect("set LOW");

        assert_eq!(*seen.lock().unwrap(), Some(NetworkThreatLevel::Low));
    }

    #[test]
    fn option_descriptor_matches_registration() {
        let (adapter, _) = adapter::<FriendsThreatLevel>();
        let option = adapter.option();
        assert_eq!(option.key, "friendsThreatLevel");
        assert_eq!(option.default_value, "NORMAL");
        assert_eq!(option.sort_order, 1);
        assert!(!option.expert);
        assert!(option.force_write);
        assert_eq!(option.short_desc_key, "SecurityLevels.friendsThreatLevelShort");
        assert_eq!(option.long_desc_key, "SecurityLevels.friendsThreatLevel");
        assert_eq!(option.possible_values, ["HIGH", "NORMAL", "LOW"]);
    }

    #[test]
    fn initial_value_falls_back_on_garbage() {
        let config = MemoryConfig::new(SecurityLevelsConfig {
            network_threat_level: Some("PARANOID".to_string()),
            physical_threat_level: Some("LOW".to_string()),
            ..SecurityLevelsConfig::default()
        });
        assert_eq!(load_initial::<NetworkThreatLevel>(&config), NetworkThreatLevel::Normal);
        assert_eq!(load_initial::<FriendsThreatLevel>(&config), FriendsThreatLevel::Normal);
        assert_eq!(load_initial::<PhysicalThreatLevel>(&config), PhysicalThreatLevel::Low);
    }

    proptest! {
        #[test]
        fn unknown_text_is_always_rejected(text in "\\PC{0,16}") {
            prop_assume!(NetworkThreatLevel::parse(&text).is_none());
            let (adapter, config) = adapter::<NetworkThreatLevel>();
            adapter.set_value(NetworkThreatLevel::High).expect("seed value");

            let result = adapter.set(&text);
            prop_assert!(
                matches!(result, Err(SecurityLevelError::InvalidValue { .. })),
                "expected InvalidValue for {:?}",
                text
            );
            prop_assert_eq!(adapter.value(), NetworkThreatLevel::High);
            prop_assert_eq!(config.flush_count(), 1);
        }

        #[test]
        fn last_valid_set_wins(picks in proptest::collection::vec(0_usize..3, 1..20)) {
            let (adapter, config) = adapter::<FriendsThreatLevel>();
            for pick in &picks {
                adapter.set(FriendsThreatLevel::MEMBERS[*pick].name()).expect("valid member");
            }
            let last = FriendsThreatLevel::MEMBERS[*picks.last().unwrap()];
            prop_assert_eq!(adapter.value(), last);
            prop_assert_eq!(config.flush_count(), picks.len());
        }
    }
}
