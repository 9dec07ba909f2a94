//! Peer identity: a 160-bit id paired with a reachable network location.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::key::KeyInt;

/// A DHT peer's identity and last-known location.
///
/// Equality and hashing are defined solely over `id`, so the same logical
/// peer always collapses to one entry regardless of which `ip`/`port` a
/// particular sighting carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAddress {
    pub id: KeyInt,
    pub ip: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(id: KeyInt, ip: impl Into<String>, port: u16) -> NodeAddress {
        NodeAddress {
            id,
            ip: ip.into(),
            port,
        }
    }
}

impl PartialEq for NodeAddress {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeAddress {}

impl Hash for NodeAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_ip_and_port() {
        let id = KeyInt::from_u64(7);
        let a = NodeAddress::new(id, "10.0.0.1", 4000);
        let b = NodeAddress::new(id, "10.0.0.2", 5000);
        assert_eq!(a, b);
    }
}
