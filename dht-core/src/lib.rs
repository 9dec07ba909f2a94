//! Kademlia-style DHT core.
//!
//! Three tightly coupled pieces make up the hard engineering here: the
//! fixed-width 160-bit [`key::KeyInt`] that gives the DHT its metric, the
//! per-node [`routing::RoutingTable`] of LRU k-buckets, and [`node::NodeCore`]'s
//! iterative `node_lookup`. Everything else (the simulator driver, the
//! shell, persistence to text/graphviz) is an external collaborator that
//! only talks to the core through the surface re-exported here.

pub mod address;
pub mod bitmap;
pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod node;
pub mod persist;
pub mod routing;
pub mod transport;

pub use address::NodeAddress;
pub use bitmap::BitMap;
pub use config::Configuration;
pub use entry::EntryStore;
pub use error::{CoreError, CoreResult};
pub use key::KeyInt;
pub use node::NodeCore;
pub use routing::{ObserveOutcome, RoutingTable};
pub use transport::{FindValueOutcome, InProcessTransport, LocalRpc, Transport};
