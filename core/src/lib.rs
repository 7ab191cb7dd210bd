//! Livelli di sicurezza di un nodo P2P.
//!
//! Un nodo ha tre "manopole" di sicurezza indipendenti, scelte dall'utente
//! al primo avvio e modificabili in qualsiasi momento. Il loro valore
//! corrente guida i default di molti altri sottosistemi:
//!
//! - **rete** ([`NetworkThreatLevel`]): `HIGH`, `NORMAL`, `LOW`;
//! - **peer fidati** ([`FriendsThreatLevel`]): `HIGH`, `NORMAL`, `LOW`;
//! - **fisico** ([`PhysicalThreatLevel`]): `NORMAL`, `LOW`.
//!
//! Questo crate tiene lo stato tipizzato, ne gestisce le transizioni
//! validate e notifica gli osservatori; decide inoltre quando un cambio del
//! livello di rete richiede una conferma esplicita dell'utente.
//!
//! # Panoramica
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                SecurityLevels                │
//! │ ┌──────────────────────────────────────────┐ │
//! │ │ ChangeAdapter<T> × 3                    │ │  parse + commit + notify
//! │ │   └─ ListenerRegistry<T>               │ │  osservatori ordinati
//! │ └──────────────────────────────────────────┘ │
//! │ ┌──────────────────────────────────────────┐ │
//! │ │ LevelStore                              │ │  un mutex, tre valori
//! │ └──────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────┘
//!        ▲ read_initial / persist_change
//! ┌──────┴───────────┐   ┌─────────────────────┐
//! │ PersistentConfig │   │ ConfirmationPolicy  │  pura, consultata dalla UI
//! └──────────────────┘   └─────────────────────┘
//! ```
//!
//! Ogni commit segue sempre la stessa sequenza, sia dal percorso testuale
//! ([`ChangeAdapter::set`]) sia da quello diretto
//! ([`SecurityLevels::set_threat_level`]): apply sotto lock, rilascio del
//! lock, notifica dei listener, flush della configurazione.

#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::sync::Arc;

use tracing::info;

/// Validated text bridge for one dimension.
pub mod change_adapter;
/// Configuration collaborators (YAML file, in-memory) and env overrides.
pub mod config;
/// Politica di conferma per i cambi del livello di rete.
pub mod confirmation;
/// Error type.
pub mod error;
/// Dimensioni e domini dei livelli di minaccia.
pub mod level;
/// Mutex-guarded store of the current levels.
pub mod level_store;
/// Osservatori dei cambi di livello.
pub mod listener;

pub use crate::change_adapter::{ChangeAdapter, OptionDescriptor};
pub use crate::config::{MemoryConfig, PersistentConfig, SecurityLevelsConfig, YamlConfigFile};
pub use crate::confirmation::{
    ConfirmationCheckbox, ConfirmationPolicy, ConfirmationWarning, PeerCounts, TrustedPeerStats,
    WarningKind,
};
pub use crate::error::SecurityLevelError;
pub use crate::level::{
    FriendsThreatLevel, NetworkThreatLevel, PhysicalThreatLevel, ThreatDimension, ThreatLevel,
};
pub use crate::level_store::{LevelStore, LevelsSnapshot};
pub use crate::listener::{listener_fn, ListenerHandle, ListenerRegistry, SecurityLevelListener};

use crate::change_adapter::load_initial;

/// Stato dei livelli di sicurezza del nodo.
///
/// Si crea una sola volta all'avvio e si condivide come
/// `Arc<SecurityLevels>`: tutti i metodi prendono `&self` e sono sicuri da
/// chiamare da più thread.
#[derive(Debug)]
pub struct SecurityLevels {
    store: Arc<LevelStore>,
    network: ChangeAdapter<NetworkThreatLevel>,
    friends: ChangeAdapter<FriendsThreatLevel>,
    physical: ChangeAdapter<PhysicalThreatLevel>,
}

impl SecurityLevels {
    /// Costruisce lo stato leggendo i valori salvati da `config`.
    ///
    /// Un valore assente vale `NORMAL`; un valore non valido viene segnalato
    /// con un warning e sostituito dal default.
    pub fn new(config: Arc<dyn PersistentConfig>) -> Self {
        let initial = LevelsSnapshot {
            network: load_initial(config.as_ref()),
            friends: load_initial(config.as_ref()),
            physical: load_initial(config.as_ref()),
        };
        info!(
            network = %initial.network,
            friends = %initial.friends,
            physical = %initial.physical,
            "security levels loaded"
        );

        let store = Arc::new(LevelStore::new(initial));
        Self {
            network: ChangeAdapter::new(Arc::clone(&store), Arc::clone(&config)),
            friends: ChangeAdapter::new(Arc::clone(&store), Arc::clone(&config)),
            physical: ChangeAdapter::new(Arc::clone(&store), config),
            store,
        }
    }

    /// Livello di rete corrente.
    pub fn network_threat_level(&self) -> NetworkThreatLevel {
        self.store.get()
    }

    /// Livello verso i peer fidati corrente.
    pub fn friends_threat_level(&self) -> FriendsThreatLevel {
        self.store.get()
    }

    /// Livello fisico corrente.
    pub fn physical_threat_level(&self) -> PhysicalThreatLevel {
        self.store.get()
    }

    /// Tutti e tre i livelli correnti.
    pub fn snapshot(&self) -> LevelsSnapshot {
        self.store.snapshot()
    }

    /// Adapter della dimensione di rete.
    pub const fn network(&self) -> &ChangeAdapter<NetworkThreatLevel> {
        &self.network
    }

    /// Adapter della dimensione dei peer fidati.
    pub const fn friends(&self) -> &ChangeAdapter<FriendsThreatLevel> {
        &self.friends
    }

    /// Adapter della dimensione fisica.
    pub const fn physical(&self) -> &ChangeAdapter<PhysicalThreatLevel> {
        &self.physical
    }

    /// Registra un listener sul livello di rete.
    pub fn add_network_threat_level_listener(
        &self,
        listener: ListenerHandle<NetworkThreatLevel>,
    ) -> bool {
        self.network.add_listener(listener)
    }

    /// Registra un listener sul livello dei peer fidati.
    pub fn add_friends_threat_level_listener(
        &self,
        listener: ListenerHandle<FriendsThreatLevel>,
    ) -> bool {
        self.friends.add_listener(listener)
    }

    /// Registra un listener sul livello fisico.
    pub fn add_physical_threat_level_listener(
        &self,
        listener: ListenerHandle<PhysicalThreatLevel>,
    ) -> bool {
        self.physical.add_listener(listener)
    }

    /// Nome canonico del valore corrente di `dimension`.
    pub fn get(&self, dimension: ThreatDimension) -> &'static str {
        self.store.get_text(dimension)
    }

    /// Imposta `dimension` a partire dal testo, come fa il framework di configurazione.
    ///
    /// # Errors
    ///
    /// Vedi [`ChangeAdapter::set`].
    pub fn set(&self, dimension: ThreatDimension, text: &str) -> Result<(), SecurityLevelError> {
        match dimension {
            ThreatDimension::Network => self.network.set(text),
            ThreatDimension::Friends => self.friends.set(text),
            ThreatDimension::Physical => self.physical.set(text),
        }
    }

    /// Valori ammessi per `dimension`, in ordine di dichiarazione.
    pub fn possible_values(&self, dimension: ThreatDimension) -> Vec<&'static str> {
        dimension.possible_values()
    }

    /// Descrittori delle tre opzioni, in ordine di registrazione.
    pub fn options(&self) -> Vec<OptionDescriptor> {
        vec![
            self.network.option(),
            self.friends.option(),
            self.physical.option(),
        ]
    }

    /// Percorso diretto per chiamanti non interattivi.
    ///
    /// Passa per la stessa sequenza del percorso validato: i listener
    /// vengono notificati e la configurazione salvata.
    ///
    /// # Errors
    ///
    /// [`SecurityLevelError::ListenerFailures`] se qualche listener fallisce;
    /// il nuovo livello resta comunque applicato.
    pub fn set_threat_level(&self, new_level: NetworkThreatLevel) -> Result<(), SecurityLevelError> {
        self.network.set_value(new_level)
    }

    /// Avviso da mostrare prima di passare al livello di rete `candidate`,
    /// calcolato sul livello corrente e sui contatori live dei peer.
    pub fn confirm_warning(
        &self,
        candidate: NetworkThreatLevel,
        checkbox_name: &str,
        peers: &dyn TrustedPeerStats,
    ) -> Option<ConfirmationWarning> {
        ConfirmationPolicy::evaluate(
            candidate,
            self.network_threat_level(),
            PeerCounts::sample(peers),
            checkbox_name,
        )
    }
}
