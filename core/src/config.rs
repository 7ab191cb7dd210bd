//! Configuration handling for the security levels.
//!
//! The core only needs two things from persistent configuration: the stored
//! text of each level at startup, and a way to flush the current values once
//! a change is committed. That contract is the [`PersistentConfig`] trait.
//!
//! Two implementations live here:
//!
//! - [`YamlConfigFile`]: a YAML node configuration file. The levels live in
//!   its `security-levels` section; other sections are left untouched when
//!   the file is rewritten.
//! - [`MemoryConfig`]: keeps everything in memory. Used by tests and by
//!   embedders that persist configuration themselves.
//!
//! Environment variables can override the stored values at startup:
//!
//! - `SECLEVELS_NETWORK_THREAT_LEVEL`
//! - `SECLEVELS_FRIENDS_THREAT_LEVEL`
//! - `SECLEVELS_PHYSICAL_THREAT_LEVEL`

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::level::{ThreatDimension, ThreatLevel};
use crate::level_store::LevelsSnapshot;

/// Name of the YAML section holding the levels.
pub const SECTION: &str = "security-levels";

/// Persistent configuration collaborator.
pub trait PersistentConfig: Send + Sync {
    /// Stored text for `key` (e.g. `networkThreatLevel`), if any.
    fn read_initial(&self, key: &str) -> Option<String>;

    /// Flushes the committed levels to durable storage.
    ///
    /// Called once per committed change. Failures are logged by the caller
    /// and do not affect the change.
    fn persist_change(&self, levels: &LevelsSnapshot) -> Result<()>;
}

/// Stored text of the three levels, as found in configuration.
///
/// Values are kept as text: validation happens when the levels are built,
/// where an unknown value falls back to the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLevelsConfig {
    /// Stored network threat level.
    #[serde(
        rename = "networkThreatLevel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub network_threat_level: Option<String>,
    /// Stored friends threat level.
    #[serde(
        rename = "friendsThreatLevel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub friends_threat_level: Option<String>,
    /// Stored physical threat level.
    #[serde(
        rename = "physicalThreatLevel",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub physical_threat_level: Option<String>,
}

impl SecurityLevelsConfig {
    /// Stored text for a config key (`networkThreatLevel`, ...).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        let dimension = ThreatDimension::ALL
            .into_iter()
            .find(|d| d.config_key() == key)?;
        self.slot(dimension).as_deref()
    }

    /// Loads the `security-levels` section of a YAML file.
    ///
    /// A file without that section yields an empty configuration.
    pub fn from_yaml(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let document: serde_yaml::Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?;
        section_of(&document)
    }

    /// Builds a configuration from environment variables only.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Overrides stored values with the `SECLEVELS_*` environment variables.
    ///
    /// Values are trimmed and upper-cased; anything that is not a member of
    /// the dimension's domain is an error.
    pub fn apply_env(&mut self) -> Result<()> {
        for dimension in ThreatDimension::ALL {
            let key = env_key(dimension);
            let Ok(raw) = env::var(key) else {
                continue;
            };
            let value = raw.trim().to_ascii_uppercase();
            if !dimension.possible_values().iter().any(|v| *v == value) {
                return Err(anyhow!(
                    "Invalid value for {key}: {raw:?} (expected one of {:?})",
                    dimension.possible_values()
                ));
            }
            *self.slot_mut(dimension) = Some(value);
        }
        Ok(())
    }

    fn slot(&self, dimension: ThreatDimension) -> &Option<String> {
        match dimension {
            ThreatDimension::Network => &self.network_threat_level,
            ThreatDimension::Friends => &self.friends_threat_level,
            ThreatDimension::Physical => &self.physical_threat_level,
        }
    }

    fn slot_mut(&mut self, dimension: ThreatDimension) -> &mut Option<String> {
        match dimension {
            ThreatDimension::Network => &mut self.network_threat_level,
            ThreatDimension::Friends => &mut self.friends_threat_level,
            ThreatDimension::Physical => &mut self.physical_threat_level,
        }
    }
}

impl From<&LevelsSnapshot> for SecurityLevelsConfig {
    fn from(levels: &LevelsSnapshot) -> Self {
        Self {
            network_threat_level: Some(levels.network.name().to_string()),
            friends_threat_level: Some(levels.friends.name().to_string()),
            physical_threat_level: Some(levels.physical.name().to_string()),
        }
    }
}

/// Environment variable overriding `dimension`.
#[must_use]
pub const fn env_key(dimension: ThreatDimension) -> &'static str {
    match dimension {
        ThreatDimension::Network => "SECLEVELS_NETWORK_THREAT_LEVEL",
        ThreatDimension::Friends => "SECLEVELS_FRIENDS_THREAT_LEVEL",
        ThreatDimension::Physical => "SECLEVELS_PHYSICAL_THREAT_LEVEL",
    }
}

fn section_of(document: &serde_yaml::Value) -> Result<SecurityLevelsConfig> {
    match document.get(SECTION) {
        Some(section) => serde_yaml::from_value(section.clone())
            .with_context(|| format!("Invalid `{SECTION}` section")),
        None => Ok(SecurityLevelsConfig::default()),
    }
}

/// YAML node configuration file backing the levels.
#[derive(Debug)]
pub struct YamlConfigFile {
    path: PathBuf,
    document: Mutex<serde_yaml::Value>,
    levels: SecurityLevelsConfig,
}

impl YamlConfigFile {
    /// Opens `path`. A missing file is treated as an empty configuration
    /// and is created on the first flush.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Unable to read config file {}", path.display()))?;
            if raw.trim().is_empty() {
                serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
            } else {
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("Invalid YAML in {}", path.display()))?
            }
        } else {
            serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
        };
        let levels = section_of(&document)?;

        Ok(Self {
            path,
            document: Mutex::new(document),
            levels,
        })
    }

    /// Like [`YamlConfigFile::open`], then applies the `SECLEVELS_*`
    /// environment overrides.
    pub fn open_with_env(path: impl Into<PathBuf>) -> Result<Self> {
        let mut file = Self::open(path)?;
        file.levels.apply_env()?;
        Ok(file)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Levels read at open time (after environment overrides, if any).
    #[must_use]
    pub const fn levels(&self) -> &SecurityLevelsConfig {
        &self.levels
    }

    fn document(&self) -> MutexGuard<'_, serde_yaml::Value> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistentConfig for YamlConfigFile {
    fn read_initial(&self, key: &str) -> Option<String> {
        self.levels.get(key).map(str::to_string)
    }

    fn persist_change(&self, levels: &LevelsSnapshot) -> Result<()> {
        let section = serde_yaml::to_value(SecurityLevelsConfig::from(levels))?;

        // Held until the rename: flushes share one temp file.
        let mut document = self.document();
        if !document.is_mapping() {
            *document = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
        }
        if let Some(mapping) = document.as_mapping_mut() {
            mapping.insert(serde_yaml::Value::from(SECTION), section);
        }
        let rendered = serde_yaml::to_string(&*document)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Unable to create config dir {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, rendered)
            .with_context(|| format!("Unable to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Unable to replace {}", self.path.display()))?;
        drop(document);

        debug!(path = %self.path.display(), "security levels persisted");
        Ok(())
    }
}

/// In-memory configuration collaborator.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    initial: SecurityLevelsConfig,
    persisted: Mutex<Vec<LevelsSnapshot>>,
}

impl MemoryConfig {
    /// Creates a collaborator serving `initial` at startup.
    #[must_use]
    pub fn new(initial: SecurityLevelsConfig) -> Self {
        Self {
            initial,
            persisted: Mutex::new(Vec::new()),
        }
    }

    /// Number of flushes received so far.
    pub fn flush_count(&self) -> usize {
        self.persisted().len()
    }

    /// Levels received by the most recent flush.
    pub fn last_persisted(&self) -> Option<LevelsSnapshot> {
        self.persisted().last().copied()
    }

    fn persisted(&self) -> MutexGuard<'_, Vec<LevelsSnapshot>> {
        self.persisted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PersistentConfig for MemoryConfig {
    fn read_initial(&self, key: &str) -> Option<String> {
        self.initial.get(key).map(str::to_string)
    }

    fn persist_change(&self, levels: &LevelsSnapshot) -> Result<()> {
        self.persisted().push(*levels);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{NetworkThreatLevel, PhysicalThreatLevel};

    fn reset_env() {
        for dimension in ThreatDimension::ALL {
            env::remove_var(env_key(dimension));
        }
    }

    #[test]
    fn get_maps_config_keys() {
        let cfg = SecurityLevelsConfig {
            network_threat_level: Some("HIGH".to_string()),
            ..SecurityLevelsConfig::default()
        };
        assert_eq!(cfg.get("networkThreatLevel"), Some("HIGH"));
        assert_eq!(cfg.get("friendsThreatLevel"), None);
        assert_eq!(cfg.get("unknownKey"), None);
    }

    // Environment variables are process-wide: keep every env case in one test.
    #[test]
    fn env_overrides() {
        reset_env();
        env::set_var("SECLEVELS_NETWORK_THREAT_LEVEL", " high ");
        env::set_var("SECLEVELS_PHYSICAL_THREAT_LEVEL", "LOW");

        let cfg = SecurityLevelsConfig::from_env().expect("config from env");
        assert_eq!(cfg.network_threat_level.as_deref(), Some("HIGH"));
        assert_eq!(cfg.friends_threat_level, None);
        assert_eq!(cfg.physical_threat_level.as_deref(), Some("LOW"));

        env::set_var("SECLEVELS_PHYSICAL_THREAT_LEVEL", "HIGH");
        assert!(SecurityLevelsConfig::from_env().is_err());

        reset_env();
        assert_eq!(
            SecurityLevelsConfig::from_env().expect("empty env"),
            SecurityLevelsConfig::default()
        );
    }

    #[test]
    fn yaml_section_is_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("node.yaml");
        fs::write(
            &path,
            "node:\n  port: 1234\nsecurity-levels:\n  networkThreatLevel: LOW\n",
        )
        .expect("write yaml");

        let cfg = SecurityLevelsConfig::from_yaml(&path).expect("load yaml");
        assert_eq!(cfg.network_threat_level.as_deref(), Some("LOW"));
        assert_eq!(cfg.physical_threat_level, None);
    }

    #[test]
    fn missing_yaml_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = YamlConfigFile::open(dir.path().join("absent.yaml")).expect("open");
        assert_eq!(file.read_initial("networkThreatLevel"), None);
    }

    #[test]
    fn persist_rewrites_section_and_keeps_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("node.yaml");
        fs::write(&path, "node:\n  port: 1234\n").expect("write yaml");

        let file = YamlConfigFile::open(&path).expect("open");
        let levels = LevelsSnapshot {
            network: NetworkThreatLevel::High,
            physical: PhysicalThreatLevel::Low,
            ..LevelsSnapshot::default()
        };
        file.persist_change(&levels).expect("persist");

        let reopened = YamlConfigFile::open(&path).expect("reopen");
        assert_eq!(reopened.read_initial("networkThreatLevel").as_deref(), Some("HIGH"));
        assert_eq!(reopened.read_initial("friendsThreatLevel").as_deref(), Some("NORMAL"));
        assert_eq!(reopened.read_initial("physicalThreatLevel").as_deref(), Some("LOW"));

        let raw = fs::read_to_string(&path).expect("read back");
        let document: serde_yaml::Value = serde_yaml::from_str(&raw).expect("yaml");
        assert_eq!(document["node"]["port"].as_u64(), Some(1234));
    }

    #[test]
    fn concurrent_flushes_all_succeed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("node.yaml");
        let file = std::sync::Arc::new(YamlConfigFile::open(&path).expect("open"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let file = std::sync::Arc::clone(&file);
                std::thread::spawn(move || {
                    for j in 0..10 {
                        let levels = LevelsSnapshot {
                            network: NetworkThreatLevel::MEMBERS[(i + j) % 3],
                            ..LevelsSnapshot::default()
                        };
                        file.persist_change(&levels).expect("persist");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("writer");
        }

        let reopened = YamlConfigFile::open(&path).expect("reopen");
        assert!(reopened.read_initial("networkThreatLevel").is_some());
        assert!(!path.with_extension("yaml.tmp").exists());
    }

    #[test]
    fn memory_config_counts_flushes() {
        let cfg = MemoryConfig::default();
        assert_eq!(cfg.flush_count(), 0);
        cfg.persist_change(&LevelsSnapshot::default()).expect("persist");
        assert_eq!(cfg.flush_count(), 1);
        assert_eq!(cfg.last_persisted(), Some(LevelsSnapshot::default()));
    }
}
