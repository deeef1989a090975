use core::hash::{BuildHasher, Hash, Hasher};
use malachite_bigint::BigInt;
use num_traits::ToPrimitive;
use siphasher::sip::SipHasher24;

pub type PyHash = i64;
pub type PyUHash = u64;

/// Numeric hashes are based on reduction modulo the prime 2**_BITS - 1
pub const BITS: usize = 61;
pub const MODULUS: PyUHash = (1 << BITS) - 1;
/// Value a hash function uses to signal "an error occurred"; never a valid hash.
pub const SENTINEL: PyHash = -1;
pub const HASH_BITS: usize = core::mem::size_of::<PyHash>() * 8;

pub struct HashSecret {
    k0: u64,
    k1: u64,
}

impl BuildHasher for HashSecret {
    type Hasher = SipHasher24;
    fn build_hasher(&self) -> Self::Hasher {
        SipHasher24::new_with_keys(self.k0, self.k1)
    }
}

impl HashSecret {
    pub fn new(seed: u32) -> Self {
        let mut buf = [0u8; 16];
        lcg_urandom(seed, &mut buf);
        let (k0, k1) = buf.split_at(8);
        let k0 = k0.iter().rev().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        let k1 = k1.iter().rev().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        Self { k0, k1 }
    }

    pub fn hash_value<T: Hash + ?Sized>(&self, data: &T) -> PyHash {
        let mut hasher = self.build_hasher();
        data.hash(&mut hasher);
        fix_sentinel(mod_int(hasher.finish() as PyHash))
    }

    pub fn hash_bytes(&self, value: &[u8]) -> PyHash {
        if value.is_empty() {
            0
        } else {
            self.hash_value(value)
        }
    }

    pub fn hash_str(&self, value: &str) -> PyHash {
        self.hash_bytes(value.as_bytes())
    }
}

/// Hash of an arbitrary precision integer: itself when it fits, otherwise reduced modulo
/// [`MODULUS`] keeping the sign.
pub fn hash_bigint(value: &BigInt) -> PyHash {
    let hash = match value.to_i64() {
        Some(i) => mod_int(i),
        None => {
            let reduced = value % MODULUS;
            // |reduced| < MODULUS < i64::MAX
            reduced.to_i64().unwrap_or(0)
        }
    };
    fix_sentinel(hash)
}

#[inline]
pub const fn mod_int(value: i64) -> PyHash {
    value % MODULUS as i64
}

#[inline]
pub const fn fix_sentinel(x: PyHash) -> PyHash {
    if x == SENTINEL { -2 } else { x }
}

/// Identity hash of an address, rotated so that the alignment zero bits do not cluster.
#[inline]
pub const fn hash_pointer(addr: usize) -> PyHash {
    fix_sentinel(addr.rotate_right(4) as PyHash)
}

pub fn lcg_urandom(mut x: u32, buf: &mut [u8]) {
    for b in buf {
        x = x.wrapping_mul(214013).wrapping_add(2531011);
        *b = ((x >> 16) & 0xff) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_remapped() {
        assert_eq!(fix_sentinel(-1), -2);
        assert_eq!(fix_sentinel(-2), -2);
        assert_eq!(fix_sentinel(12345), 12345);
        assert_eq!(hash_bigint(&BigInt::from(-1)), -2);
    }

    #[test]
    fn small_ints_hash_to_themselves() {
        for i in [0i64, 1, 42, -7, (1 << 40) + 3] {
            assert_eq!(hash_bigint(&BigInt::from(i)), i);
        }
    }

    #[test]
    fn big_ints_reduce_modulo_prime() {
        let big = BigInt::from(MODULUS) * BigInt::from(3) + BigInt::from(17);
        assert_eq!(hash_bigint(&big), 17);
        let neg = -(BigInt::from(u64::MAX) * BigInt::from(2));
        assert!(hash_bigint(&neg) <= 0);
    }

    #[test]
    fn str_hash_is_stable_per_secret() {
        let secret = HashSecret::new(0);
        assert_eq!(secret.hash_str(""), 0);
        assert_eq!(secret.hash_str("__add__"), secret.hash_str("__add__"));
        assert_ne!(secret.hash_str("__add__"), secret.hash_str("__radd__"));
        assert_ne!(secret.hash_str("x"), SENTINEL);
    }
}
