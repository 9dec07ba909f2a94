//! Fixed-width 160-bit unsigned integer: the DHT's key and node-id space.
//!
//! Represented as five big-endian 32-bit limbs. `limbs[0]` is the most
//! significant limb, `limbs[4]` the least significant one, so that the
//! array's own lexicographic `Ord` already matches unsigned magnitude.

use std::fmt;
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Not, Rem, Shl, Shr, Sub};

use rand::RngCore;
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, CoreResult};

const LIMBS: usize = 5;
const BITS: u32 = 160;

/// A 160-bit unsigned integer used as the DHT key/id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct KeyInt {
    limbs: [u32; LIMBS],
}

impl KeyInt {
    pub const ZERO: KeyInt = KeyInt { limbs: [0; LIMBS] };
    pub const BITS: u32 = BITS;

    /// Zero-extends a 64-bit value into the 160-bit space.
    pub fn from_u64(value: u64) -> KeyInt {
        let mut limbs = [0u32; LIMBS];
        limbs[3] = (value >> 32) as u32;
        limbs[4] = value as u32;
        KeyInt { limbs }
    }

    /// Parses a 40-character lowercase hex string. Fails with
    /// [`CoreError::InvalidFormat`] unless the length is exactly 40 and
    /// every character is a hex digit.
    pub fn from_hex(s: &str) -> CoreResult<KeyInt> {
        if s.len() != 40 {
            return Err(CoreError::InvalidFormat(format!(
                "expected 40 hex characters, got {}",
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidFormat(format!(
                "{s:?} contains a non-hex-digit character"
            )));
        }
        let bytes = hex::decode(s)
            .map_err(|e| CoreError::InvalidFormat(format!("invalid hex: {e}")))?;
        let mut limbs = [0u32; LIMBS];
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            limbs[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(KeyInt { limbs })
    }

    /// Draws a uniformly random 160-bit value from `rng`.
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> KeyInt {
        let mut bytes = [0u8; 20];
        rng.fill_bytes(&mut bytes);
        let mut limbs = [0u32; LIMBS];
        for (i, chunk) in bytes.chunks_exact(4).enumerate() {
            limbs[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        KeyInt { limbs }
    }

    /// Draws a uniformly random value confined to the low `bits` bits
    /// (zero elsewhere), so every draw is `< 2^bits`. `bits >= 160` draws
    /// from the full space. Used to keep a network's ids within its
    /// configured `B`, matching `random()`'s relationship to a bucketed
    /// routing table sized `B+1`.
    pub fn random_with_bits<R: RngCore + ?Sized>(rng: &mut R, bits: u32) -> KeyInt {
        KeyInt::random(rng) & KeyInt::low_bits_mask(bits)
    }

    /// A mask with exactly the low `bits` bits set (all bits set when
    /// `bits >= 160`).
    pub fn low_bits_mask(bits: u32) -> KeyInt {
        if bits >= BITS {
            return !KeyInt::ZERO;
        }
        (KeyInt::from_u64(1) << bits) - KeyInt::from_u64(1)
    }

    /// Exactly 40 lowercase hex characters, most-significant limb first.
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(40);
        for limb in &self.limbs {
            s.push_str(&format!("{limb:08x}"));
        }
        s
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&l| l == 0)
    }

    /// Limb-wise XOR; the Kademlia distance metric.
    pub fn xor(&self, other: &KeyInt) -> KeyInt {
        *self ^ *other
    }

    /// Position (1-based) of the highest set bit. `bit_length(0) == 0`.
    pub fn bit_length(&self) -> u32 {
        for (i, &limb) in self.limbs.iter().enumerate() {
            if limb != 0 {
                let limb_index_from_lsb = LIMBS - 1 - i;
                return (limb_index_from_lsb as u32) * 32 + (32 - limb.leading_zeros());
            }
        }
        0
    }

    /// Reads bit `i` (0 = least significant bit).
    fn get_bit(&self, i: u32) -> bool {
        if i >= BITS {
            return false;
        }
        let logical_limb = (i / 32) as usize;
        let bit_in_limb = i % 32;
        let arr_index = LIMBS - 1 - logical_limb;
        (self.limbs[arr_index] >> bit_in_limb) & 1 == 1
    }

    fn set_bit(&mut self, i: u32) {
        if i >= BITS {
            return;
        }
        let logical_limb = (i / 32) as usize;
        let bit_in_limb = i % 32;
        let arr_index = LIMBS - 1 - logical_limb;
        self.limbs[arr_index] |= 1u32 << bit_in_limb;
    }

    fn to_logical(self) -> [u32; LIMBS] {
        let mut out = [0u32; LIMBS];
        for i in 0..LIMBS {
            out[i] = self.limbs[LIMBS - 1 - i];
        }
        out
    }

    fn from_logical(lsb: [u32; LIMBS]) -> KeyInt {
        let mut limbs = [0u32; LIMBS];
        for i in 0..LIMBS {
            limbs[LIMBS - 1 - i] = lsb[i];
        }
        KeyInt { limbs }
    }

    /// Two's-complement negation, wrapping modulo 2^160.
    fn wrapping_neg(&self) -> KeyInt {
        let inverted = !*self;
        inverted + KeyInt::from_u64(1)
    }

    /// Division and remainder. Fails with [`CoreError::DivisionByZero`] when
    /// `other` is zero. Restoring long division driven by the numerator's
    /// bit length: `q*other + r == self` and `0 <= r < other`.
    pub fn div_rem(&self, other: &KeyInt) -> CoreResult<(KeyInt, KeyInt)> {
        if other.is_zero() {
            return Err(CoreError::DivisionByZero);
        }
        let mut remainder = KeyInt::ZERO;
        let mut quotient = KeyInt::ZERO;
        let n = self.bit_length();
        for i in (0..n).rev() {
            remainder = remainder << 1;
            if self.get_bit(i) {
                remainder = remainder | KeyInt::from_u64(1);
            }
            if remainder >= *other {
                remainder = remainder - *other;
                quotient.set_bit(i);
            }
        }
        Ok((quotient, remainder))
    }
}

impl fmt::Display for KeyInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Add for KeyInt {
    type Output = KeyInt;
    fn add(self, rhs: KeyInt) -> KeyInt {
        let mut limbs = [0u32; LIMBS];
        let mut carry: u64 = 0;
        for i in (0..LIMBS).rev() {
            let sum = self.limbs[i] as u64 + rhs.limbs[i] as u64 + carry;
            limbs[i] = sum as u32;
            carry = sum >> 32;
        }
        KeyInt { limbs }
    }
}

impl Sub for KeyInt {
    type Output = KeyInt;
    fn sub(self, rhs: KeyInt) -> KeyInt {
        self + rhs.wrapping_neg()
    }
}

impl Mul for KeyInt {
    type Output = KeyInt;
    fn mul(self, rhs: KeyInt) -> KeyInt {
        let a = self.to_logical();
        let b = rhs.to_logical();
        let mut acc = [0u128; LIMBS];
        for i in 0..LIMBS {
            for j in 0..LIMBS {
                let k = i + j;
                if k < LIMBS {
                    acc[k] += a[i] as u128 * b[j] as u128;
                }
            }
        }
        let mut result = [0u32; LIMBS];
        let mut carry: u128 = 0;
        for k in 0..LIMBS {
            let v = acc[k] + carry;
            result[k] = v as u32;
            carry = v >> 32;
        }
        KeyInt::from_logical(result)
    }
}

impl Div for KeyInt {
    type Output = KeyInt;
    fn div(self, rhs: KeyInt) -> KeyInt {
        self.div_rem(&rhs).expect("division by zero").0
    }
}

impl Rem for KeyInt {
    type Output = KeyInt;
    fn rem(self, rhs: KeyInt) -> KeyInt {
        self.div_rem(&rhs).expect("division by zero").1
    }
}

impl BitXor for KeyInt {
    type Output = KeyInt;
    fn bitxor(self, rhs: KeyInt) -> KeyInt {
        let mut limbs = [0u32; LIMBS];
        for i in 0..LIMBS {
            limbs[i] = self.limbs[i] ^ rhs.limbs[i];
        }
        KeyInt { limbs }
    }
}

impl BitAnd for KeyInt {
    type Output = KeyInt;
    fn bitand(self, rhs: KeyInt) -> KeyInt {
        let mut limbs = [0u32; LIMBS];
        for i in 0..LIMBS {
            limbs[i] = self.limbs[i] & rhs.limbs[i];
        }
        KeyInt { limbs }
    }
}

impl BitOr for KeyInt {
    type Output = KeyInt;
    fn bitor(self, rhs: KeyInt) -> KeyInt {
        let mut limbs = [0u32; LIMBS];
        for i in 0..LIMBS {
            limbs[i] = self.limbs[i] | rhs.limbs[i];
        }
        KeyInt { limbs }
    }
}

impl Not for KeyInt {
    type Output = KeyInt;
    fn not(self) -> KeyInt {
        let mut limbs = [0u32; LIMBS];
        for i in 0..LIMBS {
            limbs[i] = !self.limbs[i];
        }
        KeyInt { limbs }
    }
}

impl Shl<u32> for KeyInt {
    type Output = KeyInt;
    fn shl(self, s: u32) -> KeyInt {
        if s >= BITS {
            return KeyInt::ZERO;
        }
        if s == 0 {
            return self;
        }
        let lsb = self.to_logical();
        let limb_shift = (s / 32) as usize;
        let bit_shift = s % 32;
        let mut out = [0u32; LIMBS];
        for j in 0..LIMBS {
            if j < limb_shift {
                continue;
            }
            let src = j - limb_shift;
            let mut val: u64 = (lsb[src] as u64) << bit_shift;
            if bit_shift > 0 && src > 0 {
                val |= (lsb[src - 1] as u64) >> (32 - bit_shift);
            }
            out[j] = val as u32;
        }
        KeyInt::from_logical(out)
    }
}

impl Shr<u32> for KeyInt {
    type Output = KeyInt;
    fn shr(self, s: u32) -> KeyInt {
        if s >= BITS {
            return KeyInt::ZERO;
        }
        if s == 0 {
            return self;
        }
        let lsb = self.to_logical();
        let limb_shift = (s / 32) as usize;
        let bit_shift = s % 32;
        let mut out = [0u32; LIMBS];
        for j in 0..LIMBS {
            let src = j + limb_shift;
            if src >= LIMBS {
                continue;
            }
            let mut val: u64 = (lsb[src] as u64) >> bit_shift;
            if bit_shift > 0 && src + 1 < LIMBS {
                let mask = (1u64 << bit_shift) - 1;
                val |= ((lsb[src + 1] as u64) & mask) << (32 - bit_shift);
            }
            out[j] = val as u32;
        }
        KeyInt::from_logical(out)
    }
}

impl Serialize for KeyInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for KeyInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        KeyInt::from_hex(&s).map_err(DeError::custom)
    }
}
