//! Optional TOML configuration file, layered beneath CLI flags.
//!
//! Precedence, per flag: command line > `-f`/`--config` file > hard-coded
//! defaults (`B=160, k=20, alpha=3`, 50 nodes, 5 initial connections per
//! node, no seeded entries, no fixed seed, no bootstrap peers).

use std::path::Path;

use anyhow::{Context, Result};
use dht_core::Configuration;
use serde::Deserialize;

use crate::cli::Cli;

const DEFAULT_NODES: u32 = 50;
const DEFAULT_CONNECTIONS: u32 = 5;
const DEFAULT_ENTRIES: u32 = 0;

/// Mirror of [`Cli`]'s tunables, as read from a TOML file. Every field is
/// optional: an absent key simply falls through to the next precedence
/// level.
#[derive(Debug, Default, Deserialize)]
pub struct DriverConfig {
    pub bits: Option<u32>,
    pub replication: Option<u32>,
    pub alpha: Option<u32>,
    pub nodes: Option<u32>,
    pub connections: Option<u32>,
    pub entries: Option<u32>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub bootstrap: Vec<String>,
}

impl DriverConfig {
    /// Reads and parses a TOML file. Any I/O or parse failure is reported
    /// with file-path context; it never panics.
    pub fn load(path: &Path) -> Result<DriverConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Fully resolved simulator parameters, after merging CLI, file, and
/// defaults.
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    pub config: Configuration,
    pub nodes: u32,
    pub connections: u32,
    pub entries: u32,
    pub seed: Option<u64>,
    pub bootstrap: Vec<String>,
}

/// Merges a CLI parse with an optional file-sourced config, applying
/// documented defaults for whatever neither source supplies.
pub fn resolve(cli: &Cli, file: Option<DriverConfig>) -> Result<ResolvedParams> {
    let file = file.unwrap_or_default();

    let bits = cli.bits.or(file.bits).unwrap_or(160);
    let replication = cli.replication.or(file.replication).unwrap_or(20);
    let alpha = cli.alpha.or(file.alpha).unwrap_or(3);
    let nodes = cli.nodes.or(file.nodes).unwrap_or(DEFAULT_NODES);
    let connections = cli
        .connections
        .or(file.connections)
        .unwrap_or(DEFAULT_CONNECTIONS);
    let entries = cli.entries.or(file.entries).unwrap_or(DEFAULT_ENTRIES);
    let seed = cli.seed.or(file.seed);
    let bootstrap = if !cli.bootstrap.is_empty() {
        cli.bootstrap.clone()
    } else {
        file.bootstrap
    };

    let config = Configuration::new(bits, replication, alpha)
        .context("invalid B/k/alpha combination")?;

    if nodes == 0 {
        anyhow::bail!("node count must be at least 1");
    }

    Ok(ResolvedParams {
        config,
        nodes,
        connections,
        entries,
        seed,
        bootstrap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn empty_cli() -> Cli {
        Cli {
            bits: None,
            replication: None,
            alpha: None,
            nodes: None,
            connections: None,
            entries: None,
            seed: None,
            config_file: None,
            bootstrap: Vec::new(),
        }
    }

    #[test]
    fn defaults_apply_when_nothing_supplied() {
        let resolved = resolve(&empty_cli(), None).unwrap();
        assert_eq!(resolved.config.b, 160);
        assert_eq!(resolved.config.k, 20);
        assert_eq!(resolved.config.alpha, 3);
        assert_eq!(resolved.nodes, DEFAULT_NODES);
        assert_eq!(resolved.seed, None);
    }

    #[test]
    fn cli_overrides_file_which_overrides_defaults() {
        let file = DriverConfig {
            bits: Some(32),
            nodes: Some(10),
            ..Default::default()
        };
        let mut cli = empty_cli();
        cli.bits = Some(64);
        let resolved = resolve(&cli, Some(file)).unwrap();
        assert_eq!(resolved.config.b, 64);
        assert_eq!(resolved.nodes, 10);
    }

    #[test]
    fn malformed_toml_is_reported_not_panicked() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "bits = [this is not valid toml").unwrap();
        let err = DriverConfig::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("parsing config file"));
    }

    #[test]
    fn invalid_combination_is_rejected() {
        let mut cli = empty_cli();
        cli.alpha = Some(999);
        let err = resolve(&cli, None).unwrap_err();
        assert!(format!("{err:#}").contains("invalid B/k/alpha"));
    }
}
