//! Osservatori dei cambi di livello.
//!
//! Ogni dimensione ha il suo [`ListenerRegistry`]: una lista ordinata di
//! listener invocati in modo sincrono, nell'ordine di registrazione, dopo
//! che un cambio è stato applicato allo store.
//!
//! Non esiste rimozione: i listener vivono quanto il nodo.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::level::ThreatLevel;

/// Capacità di reagire al cambio di livello di una dimensione.
///
/// Il listener reagisce al cambio, non lo autorizza: un errore restituito
/// qui viene riportato al chiamante di `set`, ma il cambio resta applicato.
pub trait SecurityLevelListener<T: ThreatLevel>: Send + Sync {
    /// Chiamato dopo il commit con la coppia (vecchio, nuovo) effettivamente applicata.
    fn on_change(&self, old: T, new: T) -> anyhow::Result<()>;
}

impl<T, F> SecurityLevelListener<T> for F
where
    T: ThreatLevel,
    F: Fn(T, T) -> anyhow::Result<()> + Send + Sync,
{
    fn on_change(&self, old: T, new: T) -> anyhow::Result<()> {
        self(old, new)
    }
}

/// Handle condiviso a un listener registrato.
pub type ListenerHandle<T> = Arc<dyn SecurityLevelListener<T>>;

/// Impacchetta una closure come listener.
pub fn listener_fn<T, F>(f: F) -> ListenerHandle<T>
where
    T: ThreatLevel,
    F: Fn(T, T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Lista ordinata dei listener di una dimensione.
pub struct ListenerRegistry<T: ThreatLevel> {
    listeners: Mutex<Vec<ListenerHandle<T>>>,
}

impl<T: ThreatLevel> ListenerRegistry<T> {
    /// Crea un registro vuoto.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Registra `listener` in coda.
    ///
    /// L'identità è quella dell'`Arc`: registrare due volte la stessa istanza
    /// non duplica nulla, logga un warning e restituisce `false`.
    pub fn add_listener(&self, listener: ListenerHandle<T>) -> bool {
        let mut listeners = self.lock();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            warn!(
                dimension = %T::DIMENSION,
                "listener already registered, ignoring duplicate"
            );
            return false;
        }
        listeners.push(listener);
        debug!(
            dimension = %T::DIMENSION,
            count = listeners.len(),
            "threat level listener registered"
        );
        true
    }

    /// Numero di listener registrati.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` se non c'è alcun listener.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copia stabile della lista corrente.
    pub fn snapshot(&self) -> Vec<ListenerHandle<T>> {
        self.lock().clone()
    }

    /// Invoca tutti i listener con `(old, new)`, in ordine di registrazione.
    ///
    /// Il lock del registro è rilasciato prima delle callback, così un
    /// listener può rientrare (leggere il livello, registrare altri listener)
    /// senza deadlock. Un listener che fallisce non ferma i successivi;
    /// gli errori sono restituiti nell'ordine in cui si sono verificati.
    pub fn notify_all(&self, old: T, new: T) -> Vec<anyhow::Error> {
        let listeners = self.snapshot();
        debug!(
            dimension = %T::DIMENSION,
            %old,
            %new,
            count = listeners.len(),
            "notifying threat level listeners"
        );

        let mut errors = Vec::new();
        for listener in listeners {
            if let Err(err) = listener.on_change(old, new) {
                warn!(dimension = %T::DIMENSION, error = %err, "threat level listener failed");
                errors.push(err);
            }
        }
        errors
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ListenerHandle<T>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ThreatLevel> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ThreatLevel> fmt::Debug for ListenerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("dimension", &T::DIMENSION)
            .field("listeners", &self.len())
            .finish()
    }
}

// Confronta solo il puntatore ai dati: due `Arc<dyn _>` alla stessa istanza
// possono avere vtable diverse.
fn same_listener<T: ThreatLevel>(a: &ListenerHandle<T>, b: &ListenerHandle<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
