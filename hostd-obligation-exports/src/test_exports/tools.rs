// Copyright (c) 2022 MASSA LABS <info@massa.net>

use hostd_hash::Hash;
use hostd_models::block_height::BlockHeight;
use hostd_models::currency::Currency;
use hostd_models::obligation_id::ObligationId;
use hostd_models::transaction_id::TransactionId;
use hostd_signature::{KeyPair, Signature};

use crate::{ObligationRevision, ObligationTerms};

/// Builder for realistic, correctly co-signed obligation terms and
/// revisions.
#[derive(Clone)]
pub struct ObligationGenerator {
    /// renter keypair used to co-sign
    pub renter: KeyPair,
    /// host keypair used to co-sign
    pub host: KeyPair,
    negotiation_height: BlockHeight,
    expiration_height: BlockHeight,
    proof_deadline_height: BlockHeight,
    sector_roots: Vec<Hash>,
    payout: Currency,
    collateral: Currency,
}

impl Default for ObligationGenerator {
    fn default() -> Self {
        Self {
            renter: KeyPair::generate(),
            host: KeyPair::generate(),
            negotiation_height: BlockHeight::new(1),
            expiration_height: BlockHeight::new(100),
            proof_deadline_height: BlockHeight::new(100),
            sector_roots: Vec::new(),
            payout: Currency::from_raw(10_000_000_000),
            collateral: Currency::from_raw(5_000_000_000),
        }
    }
}

impl ObligationGenerator {
    /// set the negotiation height
    pub fn negotiation(mut self, height: u64) -> Self {
        self.negotiation_height = BlockHeight::new(height);
        self
    }

    /// set the expiration height (and the proof deadline with it)
    pub fn expiration(mut self, height: u64) -> Self {
        self.expiration_height = BlockHeight::new(height);
        self.proof_deadline_height = BlockHeight::new(height);
        self
    }

    /// set a proof deadline later than the expiration
    pub fn proof_deadline(mut self, height: u64) -> Self {
        self.proof_deadline_height = BlockHeight::new(height);
        self
    }

    /// set the committed sector roots
    pub fn sector_roots(mut self, roots: Vec<Hash>) -> Self {
        self.sector_roots = roots;
        self
    }

    /// set the formation payout
    pub fn payout(mut self, payout: Currency) -> Self {
        self.payout = payout;
        self
    }

    /// set the formation collateral
    pub fn collateral(mut self, collateral: Currency) -> Self {
        self.collateral = collateral;
        self
    }

    /// Generate co-signed formation terms with a fresh origin transaction.
    pub fn terms(&self) -> ObligationTerms {
        let origin_transaction =
            TransactionId::new(Hash::compute_from(&rand::random::<u64>().to_be_bytes()));
        let mut terms = ObligationTerms {
            renter_key: self.renter.get_public_key(),
            host_key: self.host.get_public_key(),
            negotiation_height: self.negotiation_height,
            expiration_height: self.expiration_height,
            proof_deadline_height: self.proof_deadline_height,
            sector_roots: self.sector_roots.clone(),
            payout: self.payout,
            collateral: self.collateral,
            origin_transaction,
            renter_signature: placeholder_signature(&self.renter),
            host_signature: placeholder_signature(&self.host),
        };
        let signing_hash = terms.signing_hash();
        terms.renter_signature = self.renter.sign(&signing_hash);
        terms.host_signature = self.host.sign(&signing_hash);
        terms
    }

    /// Generate a co-signed revision of the obligation with the given id.
    pub fn signed_revision(
        &self,
        id: &ObligationId,
        revision_number: u64,
        payout: Currency,
        collateral: Currency,
        sector_roots: Vec<Hash>,
    ) -> ObligationRevision {
        let mut revision = ObligationRevision {
            revision_number,
            sector_roots,
            payout,
            collateral,
            renter_signature: placeholder_signature(&self.renter),
            host_signature: placeholder_signature(&self.host),
        };
        let signing_hash = revision.signing_hash(id);
        revision.renter_signature = self.renter.sign(&signing_hash);
        revision.host_signature = self.host.sign(&signing_hash);
        revision
    }
}

fn placeholder_signature(keypair: &KeyPair) -> Signature {
    keypair.sign(&Hash::compute_from(b"placeholder"))
}
