#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

//! Interactive demo for the security levels core.
//!
//! Loads the levels from a YAML node configuration (first argument) or from
//! the `SECLEVELS_*` environment variables, then runs a small REPL:
//!
//! ```text
//! show                      current levels
//! options                   option metadata for the config framework
//! peers <total> <connected> simulate trusted peer counts
//! propose <level>           propose a network level, warn if needed
//! confirm                   tick the checkbox and apply the proposal
//! set <dimension> <value>   apply any level directly from text
//! json                      dump the levels as JSON
//! quit | exit
//! ```
//!
//! Set `RUST_LOG=debug` to see listener registration and notification.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use seclevels_core::{
    listener_fn, ConfirmationWarning, MemoryConfig, NetworkThreatLevel, PeerCounts,
    PersistentConfig, SecurityLevels, SecurityLevelsConfig, ThreatDimension, ThreatLevel,
    YamlConfigFile,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CHECKBOX_NAME: &str = "confirmNetworkThreatLevel";

/// One REPL command.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Show,
    Options,
    Peers(PeerCounts),
    Propose(NetworkThreatLevel),
    Confirm,
    Set(ThreatDimension, String),
    Json,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Self::Help);
        };
        let args: Vec<&str> = words.collect();

        let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("show", []) => Self::Show,
            ("options", []) => Self::Options,
            ("json", []) => Self::Json,
            ("confirm", []) => Self::Confirm,
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            ("peers", [total, connected]) => Self::Peers(PeerCounts::new(
                total.parse().with_context(|| format!("invalid total: {total}"))?,
                connected
                    .parse()
                    .with_context(|| format!("invalid connected: {connected}"))?,
            )),
            ("propose", [level]) => Self::Propose(
                NetworkThreatLevel::parse(&level.to_ascii_uppercase())
                    .ok_or_else(|| anyhow!("unknown network level: {level}"))?,
            ),
            ("set", [dimension, value]) => Self::Set(
                ThreatDimension::parse(dimension)
                    .ok_or_else(|| anyhow!("unknown dimension: {dimension}"))?,
                (*value).to_string(),
            ),
            (other, _) => bail!("unknown or malformed command: {other} (try `help`)"),
        };
        Ok(command)
    }
}

/// REPL state: the levels plus what the simulated UI remembers.
struct Session {
    levels: Arc<SecurityLevels>,
    peers: PeerCounts,
    pending: Option<NetworkThreatLevel>,
}

impl Session {
    fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Show => {
                for dimension in ThreatDimension::ALL {
                    println!("{:<9} {}", dimension.as_str(), self.levels.get(dimension));
                }
                println!(
                    "trusted peers: {} added, {} connected",
                    self.peers.total_trusted, self.peers.connected_trusted
                );
            }
            Command::Options => {
                for option in self.levels.options() {
                    println!(
                        "#{} {} (default {}) values={:?} short={} long={}",
                        option.sort_order,
                        option.key,
                        option.default_value,
                        option.possible_values,
                        option.short_desc_key,
                        option.long_desc_key
                    );
                }
            }
            Command::Peers(counts) => {
                self.peers = counts;
                println!("ok");
            }
            Command::Propose(candidate) => {
                match self
                    .levels
                    .confirm_warning(candidate, CHECKBOX_NAME, &self.peers)
                {
                    Some(warning) => {
                        print_warning(&warning);
                        self.pending = Some(candidate);
                        println!("type `confirm` to tick the checkbox and apply");
                    }
                    None => {
                        self.pending = None;
                        self.levels.set_threat_level(candidate)?;
                        println!("network threat level is now {candidate}");
                    }
                }
            }
            Command::Confirm => {
                let candidate = self
                    .pending
                    .take()
                    .ok_or_else(|| anyhow!("nothing to confirm, use `propose` first"))?;
                self.levels.network().set(candidate.name())?;
                println!("network threat level is now {candidate}");
            }
            Command::Set(dimension, value) => {
                self.levels.set(dimension, &value)?;
                println!("{dimension} threat level is now {}", self.levels.get(dimension));
            }
            Command::Json => {
                println!("{}", serde_json::to_string_pretty(&self.levels.snapshot())?);
            }
            Command::Help => {
                println!("commands: show | options | peers <total> <connected> | propose <level>");
                println!("          confirm | set <dimension> <value> | json | quit");
            }
            Command::Quit => {}
        }
        Ok(())
    }
}

fn print_warning(warning: &ConfirmationWarning) {
    println!("WARNING [{}]", warning.message_key());
    println!("  message: {}", warning.kind.l10n_key());
    for (name, value) in warning.kind.message_args() {
        println!("    {name} = {value}");
    }
    println!(
        "  [ ] {} ({})",
        warning.kind.checkbox_label_key(),
        warning.checkbox.name
    );
}

fn load_config(path: Option<PathBuf>) -> Result<Arc<dyn PersistentConfig>> {
    let config: Arc<dyn PersistentConfig> = match path {
        Some(path) => {
            info!(path = %path.display(), "loading security levels from file");
            Arc::new(YamlConfigFile::open_with_env(path)?)
        }
        None => Arc::new(MemoryConfig::new(SecurityLevelsConfig::from_env()?)),
    };
    Ok(config)
}

fn register_logging_listeners(levels: &SecurityLevels) {
    levels.add_network_threat_level_listener(listener_fn(|old, new| {
        info!(%old, %new, "network threat level listener");
        Ok(())
    }));
    levels.add_friends_threat_level_listener(listener_fn(|old, new| {
        info!(%old, %new, "friends threat level listener");
        Ok(())
    }));
    levels.add_physical_threat_level_listener(listener_fn(|old, new| {
        info!(%old, %new, "physical threat level listener");
        Ok(())
    }));
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = load_config(std::env::args_os().nth(1).map(PathBuf::from))?;
    let levels = Arc::new(SecurityLevels::new(config));
    register_logging_listeners(&levels);

    let mut session = Session {
        levels,
        peers: PeerCounts::default(),
        pending: None,
    };

    println!("Security levels demo: type `help` for commands.");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        print!("> ");
        stdout.flush()?;

        if stdin.lock().read_line(&mut buffer)? == 0 {
            println!();
            break;
        }

        let command = match Command::parse(buffer.trim()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {e:#}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = session.handle(command) {
            eprintln!("error: {e:#}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            levels: Arc::new(SecurityLevels::new(Arc::new(MemoryConfig::default()))),
            peers: PeerCounts::default(),
            pending: None,
        }
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("show").unwrap(), Command::Show);
        assert_eq!(
            Command::parse("peers 5 2").unwrap(),
            Command::Peers(PeerCounts::new(5, 2))
        );
        assert_eq!(
            Command::parse("propose high").unwrap(),
            Command::Propose(NetworkThreatLevel::High)
        );
        assert_eq!(
            Command::parse("set physical LOW").unwrap(),
            Command::Set(ThreatDimension::Physical, "LOW".to_string())
        );
        assert!(Command::parse("peers five 2").is_err());
        assert!(Command::parse("propose paranoid").is_err());
        assert!(Command::parse("dance").is_err());
    }

    #[test]
    fn risky_proposal_waits_for_confirm() {
        let mut session = session();

        session
            .handle(Command::Propose(NetworkThreatLevel::High))
            .unwrap();
        assert_eq!(session.pending, Some(NetworkThreatLevel::High));
        assert_eq!(session.levels.network_threat_level(), NetworkThreatLevel::Normal);

        session.handle(Command::Confirm).unwrap();
        assert_eq!(session.pending, None);
        assert_eq!(session.levels.network_threat_level(), NetworkThreatLevel::High);
    }

    #[test]
    fn safe_proposal_applies_immediately() {
        let mut session = session();
        session.peers = PeerCounts::new(12, 11);

        session
            .handle(Command::Propose(NetworkThreatLevel::High))
            .unwrap();
        assert_eq!(session.pending, None);
        assert_eq!(session.levels.network_threat_level(), NetworkThreatLevel::High);
    }

    #[test]
    fn confirm_without_proposal_fails() {
        let mut session = session();
        assert!(session.handle(Command::Confirm).is_err());
    }
}
