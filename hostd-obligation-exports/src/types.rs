// Copyright (c) 2022 MASSA LABS <info@massa.net>

use hostd_hash::{Hash, HashDeserializer, HashSerializer};
use hostd_models::block_height::{BlockHeight, BlockHeightDeserializer, BlockHeightSerializer};
use hostd_models::block_id::{BlockId, BlockIdDeserializer, BlockIdSerializer};
use hostd_models::currency::{Currency, CurrencyDeserializer, CurrencySerializer};
use hostd_models::obligation_id::{ObligationId, ObligationIdDeserializer, ObligationIdSerializer};
use hostd_models::transaction_id::{
    TransactionId, TransactionIdDeserializer, TransactionIdSerializer,
};
use hostd_serialization::{
    Deserializer, OptionDeserializer, OptionSerializer, SerializeError, Serializer,
    U64VarIntDeserializer, U64VarIntSerializer,
};
use hostd_signature::{
    PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature, SignatureDeserializer,
    SignatureSerializer,
};
use nom::error::{context, ContextError, ErrorKind, ParseError};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::ops::Bound::Included;

/// Confirmation state of one of an obligation's on-chain transactions.
/// Only the consensus change processor transitions these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// the transaction was not seen in any canonical block yet
    Unconfirmed,
    /// the transaction was confirmed by the given canonical block
    Confirmed {
        /// block that contains the transaction
        block: BlockId,
    },
    /// the confirming block was reverted; behaves as unconfirmed for
    /// eligibility but keeps the revert auditable
    Reverted,
}

impl ConfirmationStatus {
    /// true if currently confirmed
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationStatus::Confirmed { .. })
    }

    /// true if confirmed by exactly the given block
    pub fn confirmed_in(&self, block_id: &BlockId) -> bool {
        matches!(self, ConfirmationStatus::Confirmed { block } if block == block_id)
    }
}

/// Why an obligation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// the proof deadline passed without a confirmed storage proof
    MissedProofDeadline,
    /// no data was ever stored under the obligation, no proof is possible
    EmptySectorRoots,
}

/// Terminal outcome of an obligation, with the evidence that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObligationResolution {
    /// the storage proof confirmed on-chain
    Succeeded {
        /// block that confirmed the proof
        block: BlockId,
    },
    /// the obligation failed
    Failed {
        /// failure cause
        cause: FailureCause,
    },
}

/// Auditable status of an obligation, derived from its resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObligationStatus {
    /// not yet resolved
    Unresolved,
    /// proof confirmed, payment claimable
    Succeeded,
    /// proof missed or impossible, collateral forfeited
    Failed,
}

/// A co-signed update of an obligation's terms. The latest revision is
/// authoritative for payout and proof terms; earlier revisions are
/// retained for dispute and audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationRevision {
    /// strictly increasing revision number
    pub revision_number: u64,
    /// roots of the sectors committed under this revision, in order;
    /// defines the merkle root the storage proof must match
    pub sector_roots: Vec<Hash>,
    /// amount paid to the host if the proof confirms
    pub payout: Currency,
    /// host collateral at risk under this revision
    pub collateral: Currency,
    /// renter signature over the revision
    pub renter_signature: Signature,
    /// host signature over the revision
    pub host_signature: Signature,
}

impl ObligationRevision {
    /// The hash both parties sign: binds the obligation id and every term
    /// of the revision except the signatures themselves.
    pub fn signing_hash(&self, id: &ObligationId) -> Hash {
        let mut buffer = Vec::new();
        buffer.extend(id.to_bytes());
        buffer.extend(self.revision_number.to_be_bytes());
        buffer.extend((self.sector_roots.len() as u64).to_be_bytes());
        for root in &self.sector_roots {
            buffer.extend(root.to_bytes());
        }
        buffer.extend(self.payout.to_raw().to_be_bytes());
        buffer.extend(self.collateral.to_raw().to_be_bytes());
        Hash::compute_from(&buffer)
    }
}

/// Formation terms of a new obligation, as negotiated with the renter.
#[derive(Debug, Clone)]
pub struct ObligationTerms {
    /// renter public key co-signing every revision
    pub renter_key: PublicKey,
    /// host public key co-signing every revision
    pub host_key: PublicKey,
    /// height at which the contract was negotiated
    pub negotiation_height: BlockHeight,
    /// height at which the contract expires
    pub expiration_height: BlockHeight,
    /// height at which the obligation is voided without a confirmed proof;
    /// at least the expiration height
    pub proof_deadline_height: BlockHeight,
    /// roots of the sectors committed at formation (usually empty)
    pub sector_roots: Vec<Hash>,
    /// payout of the formation revision
    pub payout: Currency,
    /// host collateral locked by the formation revision
    pub collateral: Currency,
    /// the on-chain contract formation transaction to watch
    pub origin_transaction: TransactionId,
    /// renter signature over the terms
    pub renter_signature: Signature,
    /// host signature over the terms
    pub host_signature: Signature,
}

impl ObligationTerms {
    /// The hash both parties sign, and from which the obligation
    /// identifier is derived.
    pub fn signing_hash(&self) -> Hash {
        let mut buffer = Vec::new();
        buffer.extend(self.renter_key.to_bytes());
        buffer.extend(self.host_key.to_bytes());
        buffer.extend(self.negotiation_height.0.to_be_bytes());
        buffer.extend(self.expiration_height.0.to_be_bytes());
        buffer.extend(self.proof_deadline_height.0.to_be_bytes());
        buffer.extend((self.sector_roots.len() as u64).to_be_bytes());
        for root in &self.sector_roots {
            buffer.extend(root.to_bytes());
        }
        buffer.extend(self.payout.to_raw().to_be_bytes());
        buffer.extend(self.collateral.to_raw().to_be_bytes());
        buffer.extend(self.origin_transaction.to_bytes());
        Hash::compute_from(&buffer)
    }

    /// The identifier the obligation will carry: the hash of its terms.
    pub fn derive_id(&self) -> ObligationId {
        ObligationId::new(self.signing_hash())
    }
}

/// The central entity: a contract committing the host to store specific
/// data until an expiration height in exchange for payment, enforceable
/// via storage-proof submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObligation {
    /// identifier, immutable once assigned
    pub id: ObligationId,
    /// renter public key
    pub renter_key: PublicKey,
    /// host public key
    pub host_key: PublicKey,
    /// height at which the contract was negotiated
    pub negotiation_height: BlockHeight,
    /// height at which the contract expires
    pub expiration_height: BlockHeight,
    /// height at which the obligation is voided without a confirmed proof
    pub proof_deadline_height: BlockHeight,
    /// append-only revision history; entry 0 is the formation revision,
    /// the last entry is authoritative
    pub revisions: Vec<ObligationRevision>,
    /// the contract formation transaction being watched
    pub origin_transaction: TransactionId,
    /// the latest broadcast revision transaction being watched, if any
    pub revision_transaction: Option<TransactionId>,
    /// the submitted proof transaction being watched, if any
    pub proof_transaction: Option<TransactionId>,
    /// confirmation state of the formation transaction
    pub origin_confirmed: ConfirmationStatus,
    /// confirmation state of the latest revision transaction
    pub revision_confirmed: ConfirmationStatus,
    /// confirmation state of the proof transaction
    pub proof_confirmed: ConfirmationStatus,
    /// height at which a proof was last handed to the broadcaster, used to
    /// avoid redundant resubmission before a confirmation is observed
    pub proof_submitted_at: Option<BlockHeight>,
    /// terminal outcome, if reached
    pub resolution: Option<ObligationResolution>,
    /// collateral locked for this obligation
    pub locked_collateral: Currency,
    /// part of the locked collateral at risk of forfeiture
    pub risked_collateral: Currency,
    /// revenue accrued on success
    pub accrued_revenue: Currency,
}

impl StorageObligation {
    /// Builds the obligation record for freshly accepted formation terms.
    pub fn from_terms(terms: ObligationTerms) -> Self {
        let id = terms.derive_id();
        let formation_revision = ObligationRevision {
            revision_number: 0,
            sector_roots: terms.sector_roots,
            payout: terms.payout,
            collateral: terms.collateral,
            renter_signature: terms.renter_signature,
            host_signature: terms.host_signature,
        };
        StorageObligation {
            id,
            renter_key: terms.renter_key,
            host_key: terms.host_key,
            negotiation_height: terms.negotiation_height,
            expiration_height: terms.expiration_height,
            proof_deadline_height: terms.proof_deadline_height,
            locked_collateral: formation_revision.collateral,
            risked_collateral: formation_revision.collateral,
            revisions: vec![formation_revision],
            origin_transaction: terms.origin_transaction,
            revision_transaction: None,
            proof_transaction: None,
            origin_confirmed: ConfirmationStatus::Unconfirmed,
            revision_confirmed: ConfirmationStatus::Unconfirmed,
            proof_confirmed: ConfirmationStatus::Unconfirmed,
            proof_submitted_at: None,
            resolution: None,
            accrued_revenue: Currency::zero(),
        }
    }

    /// The authoritative revision: the last of the history.
    pub fn latest_revision(&self) -> &ObligationRevision {
        self.revisions
            .last()
            .expect("critical: obligation revision history cannot be empty")
    }

    /// Sector roots committed under the authoritative revision.
    pub fn sector_roots(&self) -> &[Hash] {
        &self.latest_revision().sector_roots
    }

    /// Auditable status, derived from the resolution.
    pub fn status(&self) -> ObligationStatus {
        match self.resolution {
            None => ObligationStatus::Unresolved,
            Some(ObligationResolution::Succeeded { .. }) => ObligationStatus::Succeeded,
            Some(ObligationResolution::Failed { .. }) => ObligationStatus::Failed,
        }
    }

    /// true once the obligation reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.resolution.is_some()
    }

    /// true if `height` falls inside the proof submission window
    /// `[expiration - proof_window, proof_deadline)`
    pub fn in_proof_window(&self, height: BlockHeight, proof_window: u64) -> bool {
        height >= self.expiration_height.saturating_sub(proof_window)
            && height < self.proof_deadline_height
    }
}

const CONFIRMATION_UNCONFIRMED_TAG: u8 = 0u8;
const CONFIRMATION_CONFIRMED_TAG: u8 = 1u8;
const CONFIRMATION_REVERTED_TAG: u8 = 2u8;

/// Serializer for `ConfirmationStatus`
#[derive(Clone, Default)]
pub struct ConfirmationStatusSerializer {
    block_id_serializer: BlockIdSerializer,
}

impl ConfirmationStatusSerializer {
    /// Creates a serializer for `ConfirmationStatus`
    pub const fn new() -> Self {
        Self {
            block_id_serializer: BlockIdSerializer::new(),
        }
    }
}

impl Serializer<ConfirmationStatus> for ConfirmationStatusSerializer {
    fn serialize(
        &self,
        value: &ConfirmationStatus,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        match value {
            ConfirmationStatus::Unconfirmed => buffer.push(CONFIRMATION_UNCONFIRMED_TAG),
            ConfirmationStatus::Confirmed { block } => {
                buffer.push(CONFIRMATION_CONFIRMED_TAG);
                self.block_id_serializer.serialize(block, buffer)?;
            }
            ConfirmationStatus::Reverted => buffer.push(CONFIRMATION_REVERTED_TAG),
        }
        Ok(())
    }
}

/// Deserializer for `ConfirmationStatus`
#[derive(Clone, Default)]
pub struct ConfirmationStatusDeserializer {
    block_id_deserializer: BlockIdDeserializer,
}

impl ConfirmationStatusDeserializer {
    /// Creates a deserializer for `ConfirmationStatus`
    pub const fn new() -> Self {
        Self {
            block_id_deserializer: BlockIdDeserializer::new(),
        }
    }
}

impl Deserializer<ConfirmationStatus> for ConfirmationStatusDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ConfirmationStatus, E> {
        context(
            "Failed ConfirmationStatus deserialization",
            |input: &'a [u8]| match input.first() {
                Some(&CONFIRMATION_UNCONFIRMED_TAG) => {
                    Ok((&input[1..], ConfirmationStatus::Unconfirmed))
                }
                Some(&CONFIRMATION_CONFIRMED_TAG) => {
                    let (rest, block) = self.block_id_deserializer.deserialize(&input[1..])?;
                    Ok((rest, ConfirmationStatus::Confirmed { block }))
                }
                Some(&CONFIRMATION_REVERTED_TAG) => {
                    Ok((&input[1..], ConfirmationStatus::Reverted))
                }
                _ => Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Tag))),
            },
        )(buffer)
    }
}

const RESOLUTION_SUCCEEDED_TAG: u8 = 0u8;
const RESOLUTION_FAILED_DEADLINE_TAG: u8 = 1u8;
const RESOLUTION_FAILED_EMPTY_TAG: u8 = 2u8;

/// Serializer for `ObligationResolution`
#[derive(Clone, Default)]
pub struct ObligationResolutionSerializer {
    block_id_serializer: BlockIdSerializer,
}

impl ObligationResolutionSerializer {
    /// Creates a serializer for `ObligationResolution`
    pub const fn new() -> Self {
        Self {
            block_id_serializer: BlockIdSerializer::new(),
        }
    }
}

impl Serializer<ObligationResolution> for ObligationResolutionSerializer {
    fn serialize(
        &self,
        value: &ObligationResolution,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        match value {
            ObligationResolution::Succeeded { block } => {
                buffer.push(RESOLUTION_SUCCEEDED_TAG);
                self.block_id_serializer.serialize(block, buffer)?;
            }
            ObligationResolution::Failed {
                cause: FailureCause::MissedProofDeadline,
            } => buffer.push(RESOLUTION_FAILED_DEADLINE_TAG),
            ObligationResolution::Failed {
                cause: FailureCause::EmptySectorRoots,
            } => buffer.push(RESOLUTION_FAILED_EMPTY_TAG),
        }
        Ok(())
    }
}

/// Deserializer for `ObligationResolution`
#[derive(Clone, Default)]
pub struct ObligationResolutionDeserializer {
    block_id_deserializer: BlockIdDeserializer,
}

impl ObligationResolutionDeserializer {
    /// Creates a deserializer for `ObligationResolution`
    pub const fn new() -> Self {
        Self {
            block_id_deserializer: BlockIdDeserializer::new(),
        }
    }
}

impl Deserializer<ObligationResolution> for ObligationResolutionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ObligationResolution, E> {
        context(
            "Failed ObligationResolution deserialization",
            |input: &'a [u8]| match input.first() {
                Some(&RESOLUTION_SUCCEEDED_TAG) => {
                    let (rest, block) = self.block_id_deserializer.deserialize(&input[1..])?;
                    Ok((rest, ObligationResolution::Succeeded { block }))
                }
                Some(&RESOLUTION_FAILED_DEADLINE_TAG) => Ok((
                    &input[1..],
                    ObligationResolution::Failed {
                        cause: FailureCause::MissedProofDeadline,
                    },
                )),
                Some(&RESOLUTION_FAILED_EMPTY_TAG) => Ok((
                    &input[1..],
                    ObligationResolution::Failed {
                        cause: FailureCause::EmptySectorRoots,
                    },
                )),
                _ => Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Tag))),
            },
        )(buffer)
    }
}

/// Serializer for `ObligationRevision`
#[derive(Clone, Default)]
pub struct ObligationRevisionSerializer {
    u64_serializer: U64VarIntSerializer,
    hash_serializer: HashSerializer,
    currency_serializer: CurrencySerializer,
    signature_serializer: SignatureSerializer,
}

impl ObligationRevisionSerializer {
    /// Creates a serializer for `ObligationRevision`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
            hash_serializer: HashSerializer::new(),
            currency_serializer: CurrencySerializer::new(),
            signature_serializer: SignatureSerializer::new(),
        }
    }
}

impl Serializer<ObligationRevision> for ObligationRevisionSerializer {
    fn serialize(
        &self,
        value: &ObligationRevision,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.u64_serializer
            .serialize(&value.revision_number, buffer)?;
        let roots_count: u64 = value.sector_roots.len().try_into().map_err(|err| {
            SerializeError::NumberTooBig(format!("too many sector roots: {}", err))
        })?;
        self.u64_serializer.serialize(&roots_count, buffer)?;
        for root in &value.sector_roots {
            self.hash_serializer.serialize(root, buffer)?;
        }
        self.currency_serializer.serialize(&value.payout, buffer)?;
        self.currency_serializer
            .serialize(&value.collateral, buffer)?;
        self.signature_serializer
            .serialize(&value.renter_signature, buffer)?;
        self.signature_serializer
            .serialize(&value.host_signature, buffer)
    }
}

/// Deserializer for `ObligationRevision`
#[derive(Clone)]
pub struct ObligationRevisionDeserializer {
    u64_deserializer: U64VarIntDeserializer,
    roots_count_deserializer: U64VarIntDeserializer,
    hash_deserializer: HashDeserializer,
    currency_deserializer: CurrencyDeserializer,
    signature_deserializer: SignatureDeserializer,
}

impl ObligationRevisionDeserializer {
    /// Creates a deserializer for `ObligationRevision`
    pub fn new(max_sector_roots: u64) -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(Included(u64::MIN), Included(u64::MAX)),
            roots_count_deserializer: U64VarIntDeserializer::new(
                Included(u64::MIN),
                Included(max_sector_roots),
            ),
            hash_deserializer: HashDeserializer::new(),
            currency_deserializer: CurrencyDeserializer::new(),
            signature_deserializer: SignatureDeserializer::new(),
        }
    }
}

impl Deserializer<ObligationRevision> for ObligationRevisionDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ObligationRevision, E> {
        context(
            "Failed ObligationRevision deserialization",
            |input: &'a [u8]| {
                let (rest, revision_number) = self.u64_deserializer.deserialize(input)?;
                let (mut rest, roots_count) = self.roots_count_deserializer.deserialize(rest)?;
                let mut sector_roots = Vec::with_capacity(roots_count as usize);
                for _ in 0..roots_count {
                    let (new_rest, root) = self.hash_deserializer.deserialize(rest)?;
                    sector_roots.push(root);
                    rest = new_rest;
                }
                let (rest, payout) = self.currency_deserializer.deserialize(rest)?;
                let (rest, collateral) = self.currency_deserializer.deserialize(rest)?;
                let (rest, renter_signature) = self.signature_deserializer.deserialize(rest)?;
                let (rest, host_signature) = self.signature_deserializer.deserialize(rest)?;
                Ok((
                    rest,
                    ObligationRevision {
                        revision_number,
                        sector_roots,
                        payout,
                        collateral,
                        renter_signature,
                        host_signature,
                    },
                ))
            },
        )(buffer)
    }
}

/// Serializer for `StorageObligation`
#[derive(Clone)]
pub struct StorageObligationSerializer {
    obligation_id_serializer: ObligationIdSerializer,
    public_key_serializer: PublicKeySerializer,
    height_serializer: BlockHeightSerializer,
    u64_serializer: U64VarIntSerializer,
    revision_serializer: ObligationRevisionSerializer,
    transaction_id_serializer: TransactionIdSerializer,
    opt_transaction_id_serializer: OptionSerializer<TransactionId, TransactionIdSerializer>,
    confirmation_serializer: ConfirmationStatusSerializer,
    opt_height_serializer: OptionSerializer<BlockHeight, BlockHeightSerializer>,
    opt_resolution_serializer: OptionSerializer<ObligationResolution, ObligationResolutionSerializer>,
    currency_serializer: CurrencySerializer,
}

impl Default for StorageObligationSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageObligationSerializer {
    /// Creates a serializer for `StorageObligation`
    pub fn new() -> Self {
        Self {
            obligation_id_serializer: ObligationIdSerializer::new(),
            public_key_serializer: PublicKeySerializer::new(),
            height_serializer: BlockHeightSerializer::new(),
            u64_serializer: U64VarIntSerializer::new(),
            revision_serializer: ObligationRevisionSerializer::new(),
            transaction_id_serializer: TransactionIdSerializer::new(),
            opt_transaction_id_serializer: OptionSerializer::new(TransactionIdSerializer::new()),
            confirmation_serializer: ConfirmationStatusSerializer::new(),
            opt_height_serializer: OptionSerializer::new(BlockHeightSerializer::new()),
            opt_resolution_serializer: OptionSerializer::new(ObligationResolutionSerializer::new()),
            currency_serializer: CurrencySerializer::new(),
        }
    }
}

impl Serializer<StorageObligation> for StorageObligationSerializer {
    fn serialize(
        &self,
        value: &StorageObligation,
        buffer: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        self.obligation_id_serializer.serialize(&value.id, buffer)?;
        self.public_key_serializer
            .serialize(&value.renter_key, buffer)?;
        self.public_key_serializer
            .serialize(&value.host_key, buffer)?;
        self.height_serializer
            .serialize(&value.negotiation_height, buffer)?;
        self.height_serializer
            .serialize(&value.expiration_height, buffer)?;
        self.height_serializer
            .serialize(&value.proof_deadline_height, buffer)?;
        let revision_count: u64 = value.revisions.len().try_into().map_err(|err| {
            SerializeError::NumberTooBig(format!("too many revisions: {}", err))
        })?;
        self.u64_serializer.serialize(&revision_count, buffer)?;
        for revision in &value.revisions {
            self.revision_serializer.serialize(revision, buffer)?;
        }
        self.transaction_id_serializer
            .serialize(&value.origin_transaction, buffer)?;
        self.opt_transaction_id_serializer
            .serialize(&value.revision_transaction, buffer)?;
        self.opt_transaction_id_serializer
            .serialize(&value.proof_transaction, buffer)?;
        self.confirmation_serializer
            .serialize(&value.origin_confirmed, buffer)?;
        self.confirmation_serializer
            .serialize(&value.revision_confirmed, buffer)?;
        self.confirmation_serializer
            .serialize(&value.proof_confirmed, buffer)?;
        self.opt_height_serializer
            .serialize(&value.proof_submitted_at, buffer)?;
        self.opt_resolution_serializer
            .serialize(&value.resolution, buffer)?;
        self.currency_serializer
            .serialize(&value.locked_collateral, buffer)?;
        self.currency_serializer
            .serialize(&value.risked_collateral, buffer)?;
        self.currency_serializer
            .serialize(&value.accrued_revenue, buffer)
    }
}

/// Deserializer for `StorageObligation`
#[derive(Clone)]
pub struct StorageObligationDeserializer {
    obligation_id_deserializer: ObligationIdDeserializer,
    public_key_deserializer: PublicKeyDeserializer,
    height_deserializer: BlockHeightDeserializer,
    revision_count_deserializer: U64VarIntDeserializer,
    revision_deserializer: ObligationRevisionDeserializer,
    transaction_id_deserializer: TransactionIdDeserializer,
    opt_transaction_id_deserializer: OptionDeserializer<TransactionId, TransactionIdDeserializer>,
    confirmation_deserializer: ConfirmationStatusDeserializer,
    opt_height_deserializer: OptionDeserializer<BlockHeight, BlockHeightDeserializer>,
    opt_resolution_deserializer:
        OptionDeserializer<ObligationResolution, ObligationResolutionDeserializer>,
    currency_deserializer: CurrencyDeserializer,
}

impl StorageObligationDeserializer {
    /// Creates a deserializer for `StorageObligation` with the configured
    /// maxima on collection sizes
    pub fn new(max_revisions: u64, max_sector_roots: u64) -> Self {
        Self {
            obligation_id_deserializer: ObligationIdDeserializer::new(),
            public_key_deserializer: PublicKeyDeserializer::new(),
            height_deserializer: BlockHeightDeserializer::default(),
            revision_count_deserializer: U64VarIntDeserializer::new(
                Included(1),
                Included(max_revisions),
            ),
            revision_deserializer: ObligationRevisionDeserializer::new(max_sector_roots),
            transaction_id_deserializer: TransactionIdDeserializer::new(),
            opt_transaction_id_deserializer: OptionDeserializer::new(
                TransactionIdDeserializer::new(),
            ),
            confirmation_deserializer: ConfirmationStatusDeserializer::new(),
            opt_height_deserializer: OptionDeserializer::new(BlockHeightDeserializer::default()),
            opt_resolution_deserializer: OptionDeserializer::new(
                ObligationResolutionDeserializer::new(),
            ),
            currency_deserializer: CurrencyDeserializer::new(),
        }
    }
}

impl Deserializer<StorageObligation> for StorageObligationDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], StorageObligation, E> {
        context(
            "Failed StorageObligation deserialization",
            |input: &'a [u8]| {
                let (rest, id) = self.obligation_id_deserializer.deserialize(input)?;
                let (rest, renter_key) = self.public_key_deserializer.deserialize(rest)?;
                let (rest, host_key) = self.public_key_deserializer.deserialize(rest)?;
                let (rest, negotiation_height) = self.height_deserializer.deserialize(rest)?;
                let (rest, expiration_height) = self.height_deserializer.deserialize(rest)?;
                let (rest, proof_deadline_height) = self.height_deserializer.deserialize(rest)?;
                let (mut rest, revision_count) =
                    self.revision_count_deserializer.deserialize(rest)?;
                let mut revisions = Vec::with_capacity(revision_count as usize);
                for _ in 0..revision_count {
                    let (new_rest, revision) = self.revision_deserializer.deserialize(rest)?;
                    revisions.push(revision);
                    rest = new_rest;
                }
                let (rest, origin_transaction) =
                    self.transaction_id_deserializer.deserialize(rest)?;
                let (rest, revision_transaction) =
                    self.opt_transaction_id_deserializer.deserialize(rest)?;
                let (rest, proof_transaction) =
                    self.opt_transaction_id_deserializer.deserialize(rest)?;
                let (rest, origin_confirmed) = self.confirmation_deserializer.deserialize(rest)?;
                let (rest, revision_confirmed) =
                    self.confirmation_deserializer.deserialize(rest)?;
                let (rest, proof_confirmed) = self.confirmation_deserializer.deserialize(rest)?;
                let (rest, proof_submitted_at) = self.opt_height_deserializer.deserialize(rest)?;
                let (rest, resolution) = self.opt_resolution_deserializer.deserialize(rest)?;
                let (rest, locked_collateral) = self.currency_deserializer.deserialize(rest)?;
                let (rest, risked_collateral) = self.currency_deserializer.deserialize(rest)?;
                let (rest, accrued_revenue) = self.currency_deserializer.deserialize(rest)?;
                Ok((
                    rest,
                    StorageObligation {
                        id,
                        renter_key,
                        host_key,
                        negotiation_height,
                        expiration_height,
                        proof_deadline_height,
                        revisions,
                        origin_transaction,
                        revision_transaction,
                        proof_transaction,
                        origin_confirmed,
                        revision_confirmed,
                        proof_confirmed,
                        proof_submitted_at,
                        resolution,
                        locked_collateral,
                        risked_collateral,
                        accrued_revenue,
                    },
                ))
            },
        )(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostd_serialization::DeserializeError;
    use hostd_signature::KeyPair;

    fn dummy_obligation() -> StorageObligation {
        let renter = KeyPair::generate();
        let host = KeyPair::generate();
        let sector_roots = vec![
            Hash::compute_from(b"sector-0"),
            Hash::compute_from(b"sector-1"),
        ];
        let terms = ObligationTerms {
            renter_key: renter.get_public_key(),
            host_key: host.get_public_key(),
            negotiation_height: BlockHeight::new(10),
            expiration_height: BlockHeight::new(100),
            proof_deadline_height: BlockHeight::new(100),
            sector_roots,
            payout: Currency::from_raw(10_000),
            collateral: Currency::from_raw(5_000),
            origin_transaction: TransactionId::new(Hash::compute_from(b"origin-tx")),
            renter_signature: renter.sign(&Hash::compute_from(b"terms")),
            host_signature: host.sign(&Hash::compute_from(b"terms")),
        };
        let mut obligation = StorageObligation::from_terms(terms);
        obligation.origin_confirmed = ConfirmationStatus::Confirmed {
            block: BlockId::new(Hash::compute_from(b"block-12")),
        };
        obligation.proof_submitted_at = Some(BlockHeight::new(95));
        obligation
    }

    #[test]
    fn test_obligation_serialization_round_trip() {
        let obligation = dummy_obligation();
        let mut buffer = Vec::new();
        StorageObligationSerializer::new()
            .serialize(&obligation, &mut buffer)
            .unwrap();
        let (rest, deserialized) = StorageObligationDeserializer::new(10_000, 1 << 20)
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deserialized, obligation);
    }

    #[test]
    fn test_obligation_round_trip_with_resolution() {
        let mut obligation = dummy_obligation();
        obligation.resolution = Some(ObligationResolution::Failed {
            cause: FailureCause::MissedProofDeadline,
        });
        let mut buffer = Vec::new();
        StorageObligationSerializer::new()
            .serialize(&obligation, &mut buffer)
            .unwrap();
        let (_, deserialized) = StorageObligationDeserializer::new(10_000, 1 << 20)
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert_eq!(deserialized.status(), ObligationStatus::Failed);
        assert_eq!(deserialized, obligation);
    }

    #[test]
    fn test_status_is_derived_from_resolution() {
        let mut obligation = dummy_obligation();
        assert_eq!(obligation.status(), ObligationStatus::Unresolved);
        assert!(!obligation.is_terminal());
        obligation.resolution = Some(ObligationResolution::Succeeded {
            block: BlockId::new(Hash::compute_from(b"proof-block")),
        });
        assert_eq!(obligation.status(), ObligationStatus::Succeeded);
        assert!(obligation.is_terminal());
    }

    #[test]
    fn test_proof_window_bounds() {
        let obligation = dummy_obligation();
        // expiration 100, deadline 100, window 10 -> [90, 100)
        assert!(!obligation.in_proof_window(BlockHeight::new(89), 10));
        assert!(obligation.in_proof_window(BlockHeight::new(90), 10));
        assert!(obligation.in_proof_window(BlockHeight::new(99), 10));
        assert!(!obligation.in_proof_window(BlockHeight::new(100), 10));
    }

    #[test]
    fn test_terms_id_is_stable() {
        let renter = KeyPair::generate();
        let host = KeyPair::generate();
        let terms = ObligationTerms {
            renter_key: renter.get_public_key(),
            host_key: host.get_public_key(),
            negotiation_height: BlockHeight::new(10),
            expiration_height: BlockHeight::new(100),
            proof_deadline_height: BlockHeight::new(100),
            sector_roots: vec![],
            payout: Currency::from_raw(10),
            collateral: Currency::from_raw(5),
            origin_transaction: TransactionId::new(Hash::compute_from(b"origin")),
            renter_signature: renter.sign(&Hash::compute_from(b"x")),
            host_signature: host.sign(&Hash::compute_from(b"x")),
        };
        // the identifier is a pure function of the signed terms
        let mut other = terms.clone();
        other.origin_transaction = TransactionId::new(Hash::compute_from(b"other origin"));
        assert_ne!(terms.derive_id(), other.derive_id());
        // signatures are not part of the identifier derivation
        let mut resigned = terms.clone();
        resigned.renter_signature = renter.sign(&Hash::compute_from(b"y"));
        assert_eq!(resigned.derive_id(), terms.derive_id());
        assert_eq!(
            StorageObligation::from_terms(terms).latest_revision().revision_number,
            0
        );
    }
}
