//! Command-line flags consumed by the simulator driver.

use std::path::PathBuf;

use clap::Parser;

/// Interactive Kademlia DHT simulator and reference implementation.
#[derive(Parser, Debug)]
#[command(name = "dht-sim", version, about)]
pub struct Cli {
    /// Key bit-width B (1..=160).
    #[arg(short = 'b', long = "bits")]
    pub bits: Option<u32>,

    /// Replication / bucket size k.
    #[arg(short = 'k', long = "replication")]
    pub replication: Option<u32>,

    /// Lookup concurrency alpha.
    #[arg(short = 'a', long = "alpha")]
    pub alpha: Option<u32>,

    /// Number of peers to instantiate.
    #[arg(short = 'n', long = "nodes")]
    pub nodes: Option<u32>,

    /// Initial PING-seeded connections per peer.
    #[arg(short = 'c', long = "connections")]
    pub connections: Option<u32>,

    /// Number of entries to seed across the network at startup.
    #[arg(short = 'N', long = "entries")]
    pub entries: Option<u32>,

    /// PRNG seed, for a reproducible run.
    #[arg(short = 'S', long = "seed")]
    pub seed: Option<u64>,

    /// TOML configuration file; overridden by any flag given on the
    /// command line.
    #[arg(short = 'f', long = "config")]
    pub config_file: Option<PathBuf>,

    /// Bootstrap peer addresses (host:port), comma- or flag-repeated.
    #[arg(short = 'B', long = "bootstrap")]
    pub bootstrap: Vec<String>,
}
