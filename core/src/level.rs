//! Dimensioni di minaccia e relativi livelli.
//!
//! Un nodo ha tre "manopole" di sicurezza indipendenti:
//!
//! - [`NetworkThreatLevel`]: quanto il nodo si espone alla rete
//!   (solo darknet, ibrido, nessuna misura che costi prestazioni);
//! - [`FriendsThreatLevel`]: quanta fiducia viene data ai peer fidati;
//! - [`PhysicalThreatLevel`]: protezione contro chi ha accesso fisico
//!   al dispositivo (cifratura dei file temporanei, ecc.).
//!
//! Ogni enumerazione è un dominio chiuso e **non ordinato**: `HIGH` non è
//! "maggiore" di `LOW` in senso numerico, per questo non deriviamo `Ord`.
//! Le etichette da mostrare all'utente non vivono qui: il core espone solo
//! il nome canonico e la chiave di localizzazione.

use std::fmt;

use serde::Serialize;

use crate::level_store::LevelsSnapshot;

/// Valore di default per tutte e tre le dimensioni, quando la
/// configurazione persistita non contiene nulla.
pub const DEFAULT_LEVEL_NAME: &str = "NORMAL";

/// Una delle tre dimensioni di minaccia gestite dal nodo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreatDimension {
    /// Esposizione verso la rete.
    Network,
    /// Esposizione verso la cerchia di peer fidati.
    Friends,
    /// Esposizione del dispositivo fisico.
    Physical,
}

impl ThreatDimension {
    /// Tutte le dimensioni, nell'ordine in cui vengono registrate.
    pub const ALL: [Self; 3] = [Self::Network, Self::Friends, Self::Physical];

    /// Nome canonico della dimensione (`"NETWORK"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Friends => "FRIENDS",
            Self::Physical => "PHYSICAL",
        }
    }

    /// Chiave sotto cui il valore è salvato nella configurazione persistente.
    #[must_use]
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::Network => "networkThreatLevel",
            Self::Friends => "friendsThreatLevel",
            Self::Physical => "physicalThreatLevel",
        }
    }

    /// Nomi canonici di tutti i membri del dominio, in ordine di dichiarazione.
    #[must_use]
    pub fn possible_values(self) -> Vec<&'static str> {
        fn names<T: ThreatLevel>() -> Vec<&'static str> {
            T::MEMBERS.iter().map(|m| m.name()).collect()
        }
        match self {
            Self::Network => names::<NetworkThreatLevel>(),
            Self::Friends => names::<FriendsThreatLevel>(),
            Self::Physical => names::<PhysicalThreatLevel>(),
        }
    }

    /// Riconosce una dimensione dal nome, senza badare a maiuscole/minuscole.
    ///
    /// Accetta sia il nome canonico (`network`) sia la chiave di
    /// configurazione (`networkThreatLevel`).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|d| {
            d.as_str().eq_ignore_ascii_case(text) || d.config_key().eq_ignore_ascii_case(text)
        })
    }
}

impl fmt::Display for ThreatDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dominio enumerato di una singola dimensione di minaccia.
///
/// È l'unico punto di variazione fra le tre dimensioni: il resto del core
/// ([`crate::ChangeAdapter`], [`crate::ListenerRegistry`], ...) è generico
/// su questo trait.
pub trait ThreatLevel:
    Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Dimensione a cui appartiene il dominio.
    const DIMENSION: ThreatDimension;

    /// Tutti i membri del dominio, in ordine di dichiarazione.
    const MEMBERS: &'static [Self];

    /// Valore usato quando la configurazione persistita è assente.
    const DEFAULT: Self;

    /// Nome canonico del membro (`"HIGH"`, `"NORMAL"`, `"LOW"`).
    fn name(self) -> &'static str;

    /// Legge il valore di questa dimensione da uno snapshot.
    fn read(levels: &LevelsSnapshot) -> Self;

    /// Scrive il valore di questa dimensione in uno snapshot.
    fn write(levels: &mut LevelsSnapshot, value: Self);

    /// Parsing esatto (case-sensitive) del nome canonico.
    fn parse(text: &str) -> Option<Self> {
        Self::MEMBERS.iter().copied().find(|m| m.name() == text)
    }

    /// Chiave di localizzazione del nome visualizzato del membro,
    /// es. `SecurityLevels.networkThreatLevel.name.HIGH`.
    fn name_key(self) -> String {
        format!(
            "SecurityLevels.{}.name.{}",
            Self::DIMENSION.config_key(),
            self.name()
        )
    }
}

/// Livello di minaccia lato rete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkThreatLevel {
    /// Paranoico: solo peer fidati (darknet).
    High,
    /// Ibrido darknet/opennet.
    Normal,
    /// Disattiva ogni misura di sicurezza che pesa sulle prestazioni.
    Low,
}

impl ThreatLevel for NetworkThreatLevel {
    const DIMENSION: ThreatDimension = ThreatDimension::Network;
    const MEMBERS: &'static [Self] = &[Self::High, Self::Normal, Self::Low];
    const DEFAULT: Self = Self::Normal;

    fn name(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Normal => "NORMAL",
            Self::Low => "LOW",
        }
    }

    fn read(levels: &LevelsSnapshot) -> Self {
        levels.network
    }

    fn write(levels: &mut LevelsSnapshot, value: Self) {
        levels.network = value;
    }
}

/// Livello di minaccia verso i peer fidati.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FriendsThreatLevel {
    /// Condivide il minimo e limita i danni se un peer è compromesso.
    High,
    /// Condivide alcune informazioni.
    Normal,
    /// I peer fidati sono considerati del tutto affidabili.
    Low,
}

impl ThreatLevel for FriendsThreatLevel {
    const DIMENSION: ThreatDimension = ThreatDimension::Friends;
    const MEMBERS: &'static [Self] = &[Self::High, Self::Normal, Self::Low];
    const DEFAULT: Self = Self::Normal;

    fn name(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Normal => "NORMAL",
            Self::Low => "LOW",
        }
    }

    fn read(levels: &LevelsSnapshot) -> Self {
        levels.friends
    }

    fn write(levels: &mut LevelsSnapshot, value: Self) {
        levels.friends = value;
    }
}

/// Livello di minaccia fisica (accesso al dispositivo).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PhysicalThreatLevel {
    /// Cifra file temporanei e dati locali.
    Normal,
    /// Nessuna cifratura locale.
    Low,
}

impl ThreatLevel for PhysicalThreatLevel {
    const DIMENSION: ThreatDimension = ThreatDimension::Physical;
    const MEMBERS: &'static [Self] = &[Self::Normal, Self::Low];
    const DEFAULT: Self = Self::Normal;

    fn name(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Low => "LOW",
        }
    }

    fn read(levels: &LevelsSnapshot) -> Self {
        levels.physical
    }

    fn write(levels: &mut LevelsSnapshot, value: Self) {
        levels.physical = value;
    }
}

impl fmt::Display for NetworkThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for FriendsThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for PhysicalThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
