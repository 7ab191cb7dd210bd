//! Politica di conferma per i cambi del livello di rete.
//!
//! Prima di applicare un cambio rischioso del [`NetworkThreatLevel`], la UI
//! chiede a [`ConfirmationPolicy::evaluate`] se l'utente va avvisato. La
//! decisione dipende dal candidato, dal livello corrente e dalla topologia
//! dei peer fidati:
//!
//! | candidato | condizione                      | avviso                         |
//! |-----------|---------------------------------|--------------------------------|
//! | = attuale | -                               | nessuno                        |
//! | `HIGH`    | nessun peer fidato              | `no-trusted-peers`             |
//! | `HIGH`    | nessun peer fidato connesso     | `no-connected-trusted-peers`   |
//! | `HIGH`    | meno di 10 peer fidati connessi | `few-connected-trusted-peers`  |
//! | `HIGH`    | 10 o più connessi               | nessuno                        |
//! | `LOW`     | sempre                          | `low-level-tradeoff`           |
//! | `NORMAL`  | -                               | nessuno                        |
//!
//! La funzione è pura: non tocca lo stato e va rivalutata ad ogni proposta.
//! I contatori possono cambiare fra la conferma e il `set` vero e proprio;
//! al massimo l'avviso mostrato era vecchio, il `set` rivalida comunque.

use serde::Serialize;

use crate::level::NetworkThreatLevel;

/// Sotto questa soglia di peer fidati connessi il passaggio a `HIGH` va confermato.
pub const MIN_CONNECTED_TRUSTED_PEERS: usize = 10;

/// Statistiche sui peer fidati (darknet), fornite dal sottosistema dei peer.
pub trait TrustedPeerStats {
    /// Numero di peer fidati aggiunti manualmente.
    fn total_trusted_peer_count(&self) -> usize;
    /// Numero di peer fidati attualmente connessi.
    fn connected_trusted_peer_count(&self) -> usize;
}

/// Fotografia dei contatori dei peer fidati.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeerCounts {
    /// Peer fidati aggiunti.
    pub total_trusted: usize,
    /// Peer fidati connessi.
    pub connected_trusted: usize,
}

impl PeerCounts {
    /// Crea una fotografia a partire da valori espliciti.
    #[must_use]
    pub const fn new(total_trusted: usize, connected_trusted: usize) -> Self {
        Self {
            total_trusted,
            connected_trusted,
        }
    }

    /// Legge i due contatori dal collaboratore dei peer.
    pub fn sample(peers: &dyn TrustedPeerStats) -> Self {
        Self::new(
            peers.total_trusted_peer_count(),
            peers.connected_trusted_peer_count(),
        )
    }
}

impl TrustedPeerStats for PeerCounts {
    fn total_trusted_peer_count(&self) -> usize {
        self.total_trusted
    }

    fn connected_trusted_peer_count(&self) -> usize {
        self.connected_trusted
    }
}

/// Motivo dell'avviso, con i dati da sostituire nel messaggio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WarningKind {
    /// Si passa a `HIGH` senza alcun peer fidato: il caso più grave.
    NoTrustedPeers,
    /// Ci sono peer fidati, ma nessuno è connesso.
    NoConnectedTrustedPeers {
        /// Peer fidati aggiunti.
        total: usize,
    },
    /// Pochi peer fidati connessi.
    FewConnectedTrustedPeers {
        /// Peer fidati connessi.
        connected: usize,
        /// Peer fidati aggiunti.
        total: usize,
    },
    /// Si passa a `LOW`: prestazioni in cambio di sicurezza.
    LowLevelTradeoff,
}

impl WarningKind {
    /// Chiave stabile del messaggio.
    #[must_use]
    pub const fn message_key(&self) -> &'static str {
        match self {
            Self::NoTrustedPeers => "no-trusted-peers",
            Self::NoConnectedTrustedPeers { .. } => "no-connected-trusted-peers",
            Self::FewConnectedTrustedPeers { .. } => "few-connected-trusted-peers",
            Self::LowLevelTradeoff => "low-level-tradeoff",
        }
    }

    /// Chiave di localizzazione del testo dell'avviso.
    #[must_use]
    pub const fn l10n_key(&self) -> &'static str {
        match self {
            Self::NoTrustedPeers => "SecurityLevels.noFriendsWarning",
            Self::NoConnectedTrustedPeers { .. } => "SecurityLevels.noConnectedFriendsWarning",
            Self::FewConnectedTrustedPeers { .. } => "SecurityLevels.fewConnectedFriendsWarning",
            Self::LowLevelTradeoff => "SecurityLevels.networkThreatLevelLowWarning",
        }
    }

    /// Chiave di localizzazione dell'etichetta della checkbox.
    #[must_use]
    pub const fn checkbox_label_key(&self) -> &'static str {
        match self {
            Self::NoTrustedPeers => "SecurityLevels.noFriendsCheckbox",
            Self::NoConnectedTrustedPeers { .. } => "SecurityLevels.noConnectedFriendsCheckbox",
            Self::FewConnectedTrustedPeers { .. } => "SecurityLevels.fewConnectedFriendsCheckbox",
            Self::LowLevelTradeoff => "SecurityLevels.networkThreatLevelLowCheckbox",
        }
    }

    /// Coppie (segnaposto, valore) per il collaboratore di localizzazione.
    #[must_use]
    pub fn message_args(&self) -> Vec<(&'static str, String)> {
        match *self {
            Self::NoConnectedTrustedPeers { total } => vec![("added", total.to_string())],
            Self::FewConnectedTrustedPeers { connected, total } => vec![
                ("connected", connected.to_string()),
                ("added", total.to_string()),
            ],
            Self::NoTrustedPeers | Self::LowLevelTradeoff => Vec::new(),
        }
    }
}

/// Checkbox di conferma che accompagna ogni avviso.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationCheckbox {
    /// Nome del campo nel form.
    pub name: String,
    /// Stato iniziale: sempre non spuntata.
    pub checked: bool,
}

/// Avviso da mostrare prima di applicare il cambio.
///
/// Il chiamante deve esigere la checkbox spuntata prima di invocare `set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationWarning {
    /// Motivo dell'avviso.
    #[serde(flatten)]
    pub kind: WarningKind,
    /// Checkbox di conferma.
    pub checkbox: ConfirmationCheckbox,
}

impl ConfirmationWarning {
    fn new(kind: WarningKind, checkbox_name: &str) -> Self {
        Self {
            kind,
            checkbox: ConfirmationCheckbox {
                name: checkbox_name.to_string(),
                checked: false,
            },
        }
    }

    /// Chiave stabile del messaggio, es. `no-trusted-peers`.
    #[must_use]
    pub const fn message_key(&self) -> &'static str {
        self.kind.message_key()
    }
}

/// Decisione senza stato su quando un cambio del livello di rete va confermato.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationPolicy;

impl ConfirmationPolicy {
    /// Valuta la proposta `candidate` rispetto al livello `current`.
    ///
    /// Restituisce `None` se il cambio si può applicare senza avvisi.
    #[must_use]
    pub fn evaluate(
        candidate: NetworkThreatLevel,
        current: NetworkThreatLevel,
        peers: PeerCounts,
        checkbox_name: &str,
    ) -> Option<ConfirmationWarning> {
        if candidate == current {
            return None;
        }

        let kind = match candidate {
            NetworkThreatLevel::High => {
                if peers.total_trusted == 0 {
                    WarningKind::NoTrustedPeers
                } else if peers.connected_trusted == 0 {
                    WarningKind::NoConnectedTrustedPeers {
                        total: peers.total_trusted,
                    }
                } else if peers.connected_trusted < MIN_CONNECTED_TRUSTED_PEERS {
                    WarningKind::FewConnectedTrustedPeers {
                        connected: peers.connected_trusted,
                        total: peers.total_trusted,
                    }
                } else {
                    return None;
                }
            }
            NetworkThreatLevel::Low => WarningKind::LowLevelTradeoff,
            NetworkThreatLevel::Normal => return None,
        };

        Some(ConfirmationWarning::new(kind, checkbox_name))
    }
}
