// Copyright (c) 2022 MASSA LABS <info@massa.net>

use hostd_hash::Hash;
use hostd_models::merkle::{verify_merkle_proof, ProofStep, ProofStepDeserializer, ProofStepSerializer};
use hostd_models::obligation_id::{ObligationId, ObligationIdDeserializer, ObligationIdSerializer};
use hostd_models::serialization::{VecU8Deserializer, VecU8Serializer};
use hostd_models::transaction_id::TransactionId;
use hostd_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use std::ops::Bound::Included;

/// The storage-proof transaction handed to the broadcast collaborator: the
/// challenged sector's data plus the merkle path binding it, through the
/// latest revision's sector roots, to the contract's commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofTransaction {
    /// obligation the proof is for
    pub obligation_id: ObligationId,
    /// revision the proof references
    pub revision_number: u64,
    /// index of the challenged sector among the revision's sector roots
    pub sector_index: u64,
    /// data of the challenged sector
    pub sector_data: Vec<u8>,
    /// sibling path from the challenged sector root up to the commitment
    pub proof_path: Vec<ProofStep>,
}

impl ProofTransaction {
    /// Identifier of this transaction: the hash of its contents.
    pub fn id(&self) -> TransactionId {
        let mut buffer = Vec::new();
        buffer.extend(self.obligation_id.to_bytes());
        buffer.extend(self.revision_number.to_be_bytes());
        buffer.extend(self.sector_index.to_be_bytes());
        buffer.extend((self.sector_data.len() as u64).to_be_bytes());
        buffer.extend(&self.sector_data);
        for step in &self.proof_path {
            buffer.extend(step.hash.to_bytes());
        }
        TransactionId::new(Hash::compute_from(&buffer))
    }

    /// Checks the proof against a commitment root: the challenged data
    /// must hash to the challenged sector root, and the sibling path must
    /// connect it to `expected_root`.
    pub fn verify(&self, expected_root: &Hash) -> bool {
        let leaf = Hash::compute_from(&self.sector_data);
        verify_merkle_proof(&leaf, &self.proof_path, expected_root)
    }
}

/// Serializer for `ProofTransaction`
#[derive(Clone, Default)]
pub struct ProofTransactionSerializer {
    obligation_id_serializer: ObligationIdSerializer,
    u64_serializer: U64VarIntSerializer,
    data_serializer: VecU8Serializer,
    step_serializer: ProofStepSerializer,
}

impl ProofTransactionSerializer {
    /// Creates a serializer for `ProofTransaction`
    pub const fn new() -> Self {
        Self {
            obligation_id_serializer: ObligationIdSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            data_serializer: VecU8Serializer::new(),
            step_serializer: ProofStepSerializer::new(),
        }
    }
}

impl Serializer<ProofTransaction> for ProofTransactionSerializer {
    fn serialize(
        &self,
        value: &ProofTransaction,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.obligation_id_serializer
            .serialize(&value.obligation_id, buffer)?;
        self.u64_serializer
            .serialize(&value.revision_number, buffer)?;
        self.u64_serializer.serialize(&value.sector_index, buffer)?;
        self.data_serializer.serialize(&value.sector_data, buffer)?;
        let step_count: u64 = value.proof_path.len().try_into().map_err(|err| {
            SerializeError::NumberTooBig(format!("proof path too long: {}", err))
        })?;
        self.u64_serializer.serialize(&step_count, buffer)?;
        for step in &value.proof_path {
            self.step_serializer.serialize(step, buffer)?;
        }
        Ok(())
    }
}

/// Deserializer for `ProofTransaction`
#[derive(Clone)]
pub struct ProofTransactionDeserializer {
    obligation_id_deserializer: ObligationIdDeserializer,
    u64_deserializer: U64VarIntDeserializer,
    data_deserializer: VecU8Deserializer,
    step_count_deserializer: U64VarIntDeserializer,
    step_deserializer: ProofStepDeserializer,
}

impl ProofTransactionDeserializer {
    /// Creates a deserializer for `ProofTransaction` with the configured
    /// maxima on sector size and proof depth
    pub fn new(max_sector_bytes: u64, max_proof_depth: u64) -> Self {
        Self {
            obligation_id_deserializer: ObligationIdDeserializer::new(),
            u64_deserializer: U64VarIntDeserializer::new(Included(u64::MIN), Included(u64::MAX)),
            data_deserializer: VecU8Deserializer::new(
                Included(u64::MIN),
                Included(max_sector_bytes),
            ),
            step_count_deserializer: U64VarIntDeserializer::new(
                Included(u64::MIN),
                Included(max_proof_depth),
            ),
            step_deserializer: ProofStepDeserializer::new(),
        }
    }
}

impl Deserializer<ProofTransaction> for ProofTransactionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ProofTransaction, E> {
        context(
            "Failed ProofTransaction deserialization",
            |input: &'a [u8]| {
                let (rest, obligation_id) = self.obligation_id_deserializer.deserialize(input)?;
                let (rest, revision_number) = self.u64_deserializer.deserialize(rest)?;
                let (rest, sector_index) = self.u64_deserializer.deserialize(rest)?;
                let (rest, sector_data) = self.data_deserializer.deserialize(rest)?;
                let (mut rest, step_count) = self.step_count_deserializer.deserialize(rest)?;
                let mut proof_path = Vec::with_capacity(step_count as usize);
                for _ in 0..step_count {
                    let (new_rest, step) = self.step_deserializer.deserialize(rest)?;
                    proof_path.push(step);
                    rest = new_rest;
                }
                Ok((
                    rest,
                    ProofTransaction {
                        obligation_id,
                        revision_number,
                        sector_index,
                        sector_data,
                        proof_path,
                    },
                ))
            },
        )(buffer)
    }
}
