// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Merkle commitment over an ordered sequence of sector roots. The root
//! is what a storage contract commits to; a proof is the sibling path
//! from one challenged leaf up to that root.

use crate::error::ModelsError;
use hostd_hash::{Hash, HashDeserializer, HashSerializer};
use hostd_serialization::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::IResult;

/// Side on which a proof sibling sits relative to the running hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingPosition {
    /// sibling is hashed on the left
    Left,
    /// sibling is hashed on the right
    Right,
}

/// One step of a merkle proof path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofStep {
    /// sibling hash
    pub hash: Hash,
    /// side of the sibling
    pub position: SiblingPosition,
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    Hash::compute_from_tuple(&[left.to_bytes(), right.to_bytes()])
}

/// Computes the merkle root of an ordered sequence of leaves.
/// The last leaf of an odd level is paired with itself.
/// An empty sequence commits to the hash of the empty string.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::compute_from(b"");
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        let mut next_level = Vec::with_capacity((level.len() + 1) / 2);
        for chunk in level.chunks(2) {
            let left = &chunk[0];
            let right = chunk.get(1).unwrap_or(left);
            next_level.push(hash_pair(left, right));
        }
        level = next_level;
    }
    level[0]
}

/// Builds the sibling path proving inclusion of `leaves[index]` under
/// `merkle_root(leaves)`.
pub fn build_merkle_proof(leaves: &[Hash], index: usize) -> Result<Vec<ProofStep>, ModelsError> {
    if index >= leaves.len() {
        return Err(ModelsError::InvalidMerkleIndex(format!(
            "challenged leaf {} out of {}",
            index,
            leaves.len()
        )));
    }

    if leaves.len() == 1 {
        return Ok(Vec::new());
    }

    let mut proof = Vec::new();
    let mut level: Vec<Hash> = leaves.to_vec();
    let mut index = index;

    while level.len() > 1 {
        let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
        if sibling_index < level.len() {
            let position = if index % 2 == 0 {
                SiblingPosition::Right
            } else {
                SiblingPosition::Left
            };
            proof.push(ProofStep {
                hash: level[sibling_index],
                position,
            });
        } else {
            // odd tail: the last leaf is paired with itself
            proof.push(ProofStep {
                hash: level[index],
                position: SiblingPosition::Right,
            });
        }

        let mut next_level = Vec::with_capacity((level.len() + 1) / 2);
        for chunk in level.chunks(2) {
            let left = &chunk[0];
            let right = chunk.get(1).unwrap_or(left);
            next_level.push(hash_pair(left, right));
        }
        level = next_level;
        index /= 2;
    }

    Ok(proof)
}

/// Checks a merkle proof: walks the sibling path from `leaf` and compares
/// the resulting hash to `expected_root`. An empty path is valid only if
/// the leaf is itself the root.
pub fn verify_merkle_proof(leaf: &Hash, proof_path: &[ProofStep], expected_root: &Hash) -> bool {
    if proof_path.is_empty() {
        return leaf == expected_root;
    }

    let mut current = *leaf;
    for step in proof_path {
        current = match step.position {
            SiblingPosition::Left => hash_pair(&step.hash, &current),
            SiblingPosition::Right => hash_pair(&current, &step.hash),
        };
    }
    current == *expected_root
}

/// Serializer for `ProofStep`
#[derive(Clone, Default)]
pub struct ProofStepSerializer {
    hash_serializer: HashSerializer,
}

impl ProofStepSerializer {
    /// Creates a serializer for `ProofStep`
    pub const fn new() -> Self {
        Self {
            hash_serializer: HashSerializer::new(),
        }
    }
}

impl Serializer<ProofStep> for ProofStepSerializer {
    fn serialize(&self, value: &ProofStep, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.push(match value.position {
            SiblingPosition::Left => 0u8,
            SiblingPosition::Right => 1u8,
        });
        self.hash_serializer.serialize(&value.hash, buffer)
    }
}

/// Deserializer for `ProofStep`
#[derive(Clone, Default)]
pub struct ProofStepDeserializer {
    hash_deserializer: HashDeserializer,
}

impl ProofStepDeserializer {
    /// Creates a deserializer for `ProofStep`
    pub const fn new() -> Self {
        Self {
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Deserializer<ProofStep> for ProofStepDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ProofStep, E> {
        context("Failed ProofStep deserialization", |input: &'a [u8]| {
            let position = match input.first() {
                Some(&0u8) => SiblingPosition::Left,
                Some(&1u8) => SiblingPosition::Right,
                _ => return Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Tag))),
            };
            let (rest, hash) = self.hash_deserializer.deserialize(&input[1..])?;
            Ok((rest, ProofStep { hash, position }))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(count: usize) -> Vec<Hash> {
        (0..count)
            .map(|i| Hash::compute_from(format!("sector-{}", i).as_bytes()))
            .collect()
    }

    #[test]
    fn test_single_leaf_is_its_own_root() {
        let leaves = leaves(1);
        assert_eq!(merkle_root(&leaves), leaves[0]);
        let proof = build_merkle_proof(&leaves, 0).unwrap();
        assert!(proof.is_empty());
        assert!(verify_merkle_proof(&leaves[0], &proof, &leaves[0]));
    }

    #[test]
    fn test_proof_round_trip_all_indices() {
        for count in [2usize, 3, 4, 7, 8, 13] {
            let leaves = leaves(count);
            let root = merkle_root(&leaves);
            for (i, leaf) in leaves.iter().enumerate() {
                let proof = build_merkle_proof(&leaves, i).unwrap();
                assert!(
                    verify_merkle_proof(leaf, &proof, &root),
                    "proof failed for leaf {} of {}",
                    i,
                    count
                );
            }
        }
    }

    #[test]
    fn test_tampered_proof_is_rejected() {
        let leaves = leaves(8);
        let root = merkle_root(&leaves);
        let mut proof = build_merkle_proof(&leaves, 3).unwrap();
        proof[1].hash = Hash::compute_from(b"tampered");
        assert!(!verify_merkle_proof(&leaves[3], &proof, &root));
    }

    #[test]
    fn test_wrong_leaf_is_rejected() {
        let leaves = leaves(4);
        let root = merkle_root(&leaves);
        let proof = build_merkle_proof(&leaves, 2).unwrap();
        assert!(!verify_merkle_proof(&leaves[1], &proof, &root));
    }

    #[test]
    fn test_out_of_range_index() {
        let leaves = leaves(4);
        assert!(build_merkle_proof(&leaves, 4).is_err());
    }
}
