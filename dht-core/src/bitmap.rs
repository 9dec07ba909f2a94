//! Bounded random permutation, used by the simulator driver to give each
//! peer a unique slot in the keyspace without replacement.
//!
//! Grounded in the Fisher-Yates "draw from a shrinking pool" approach: the
//! pool starts as `[0, n)` and each draw swaps the chosen slot to the back
//! and shrinks the live region by one, so every value is handed out exactly
//! once.

use rand::Rng;

use crate::error::{CoreError, CoreResult};

/// Draws, without replacement, a permutation of `[0, n)`.
#[derive(Debug, Clone)]
pub struct BitMap {
    pool: Vec<u32>,
    pos: usize,
}

impl BitMap {
    pub fn new(n: u32) -> BitMap {
        BitMap {
            pool: (0..n).collect(),
            pos: 0,
        }
    }

    /// Returns a value that has never been returned before. Fails with
    /// [`CoreError::Exhausted`] once all `n` values have been drawn.
    pub fn get_rand_uint<R: Rng + ?Sized>(&mut self, rng: &mut R) -> CoreResult<u32> {
        if self.is_exhausted() {
            return Err(CoreError::Exhausted);
        }
        let remaining = self.pool.len() - self.pos;
        let pick = self.pos + rng.gen_range(0..remaining);
        self.pool.swap(self.pos, pick);
        let value = self.pool[self.pos];
        self.pos += 1;
        Ok(value)
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.pool.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn draws_every_value_exactly_once() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut bitmap = BitMap::new(10);
        let mut seen = HashSet::new();
        for _ in 0..10 {
            let v = bitmap.get_rand_uint(&mut rng).unwrap();
            assert!(seen.insert(v), "value {v} drawn twice");
        }
        assert!(bitmap.is_exhausted());
    }

    #[test]
    fn exhaustion_is_reported() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut bitmap = BitMap::new(1);
        assert!(bitmap.get_rand_uint(&mut rng).is_ok());
        assert_eq!(bitmap.get_rand_uint(&mut rng), Err(CoreError::Exhausted));
    }
}
