// Copyright (c) 2022 MASSA LABS <info@massa.net>

use std::ops::{BitXor, BitXorAssign};

/// XOR-combinable hash used for whole-store integrity tracking: entries
/// can be added to and removed from the aggregate in any order.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HashXor<const SIZE: usize>(pub [u8; SIZE]);

impl<const SIZE: usize> HashXor<SIZE> {
    /// From bytes
    pub fn from_bytes(bytes: &[u8; SIZE]) -> Self {
        HashXor(*bytes)
    }

    /// Transform into bytes
    pub fn to_bytes(&self) -> &[u8; SIZE] {
        &self.0
    }

    /// Compute from raw data
    pub fn compute_from(data: &[u8]) -> HashXor<SIZE> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        let mut hash = [0u8; SIZE];
        let mut output_reader = hasher.finalize_xof();
        output_reader.fill(&mut hash);
        HashXor(hash)
    }

    /// Compute from key and value; the key length is mixed in so that
    /// `(k, v)` and `(k || v, b"")` do not collide.
    pub fn compute_from_kv(key: &[u8], value: &[u8]) -> HashXor<SIZE> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(key.len() as u64).to_be_bytes());
        hasher.update(key);
        hasher.update(value);
        let mut hash = [0u8; SIZE];
        let mut output_reader = hasher.finalize_xof();
        output_reader.fill(&mut hash);
        HashXor(hash)
    }

    /// Serialize using `bs58` encoding with checksum.
    pub fn to_bs58_check(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }
}

impl<const SIZE: usize> BitXorAssign for HashXor<SIZE> {
    fn bitxor_assign(&mut self, rhs: Self) {
        *self = *self ^ rhs;
    }
}

impl<const SIZE: usize> BitXor for HashXor<SIZE> {
    type Output = Self;

    fn bitxor(self, other: Self) -> Self {
        let mut xored = [0u8; SIZE];
        for (i, (a, b)) in self.0.iter().zip(other.0.iter()).enumerate() {
            xored[i] = a ^ b;
        }
        HashXor(xored)
    }
}

impl<const SIZE: usize> std::fmt::Display for HashXor<SIZE> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}

impl<const SIZE: usize> std::fmt::Debug for HashXor<SIZE> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_bs58_check())
    }
}
