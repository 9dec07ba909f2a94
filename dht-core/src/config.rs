//! Network-wide immutable parameters.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Immutable DHT parameters shared by every peer in a simulated network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Key bit-width, 1 <= b <= 160.
    pub b: u32,
    /// Replication / bucket size, k >= 1.
    pub k: u32,
    /// Lookup concurrency, 1 <= alpha <= k.
    pub alpha: u32,
}

impl Configuration {
    /// Validates and builds a Configuration. Rejects out-of-range values
    /// with [`CoreError::InvalidFormat`].
    pub fn new(b: u32, k: u32, alpha: u32) -> CoreResult<Configuration> {
        if b == 0 || b > 160 {
            return Err(CoreError::InvalidFormat(format!(
                "bit-width b must be in 1..=160, got {b}"
            )));
        }
        if k == 0 {
            return Err(CoreError::InvalidFormat(
                "replication factor k must be >= 1".to_string(),
            ));
        }
        if alpha == 0 || alpha > k {
            return Err(CoreError::InvalidFormat(format!(
                "concurrency alpha must be in 1..={k}, got {alpha}"
            )));
        }
        Ok(Configuration { b, k, alpha })
    }
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            b: 160,
            k: 20,
            alpha: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_alpha_greater_than_k() {
        assert!(Configuration::new(160, 5, 6).is_err());
    }

    #[test]
    fn rejects_zero_bits() {
        assert!(Configuration::new(0, 20, 3).is_err());
    }

    #[test]
    fn accepts_defaults() {
        assert!(Configuration::new(160, 20, 3).is_ok());
    }
}
