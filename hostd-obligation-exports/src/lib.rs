// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Definition and exports of the storage-obligation types, errors,
//! controller traits and external-collaborator interfaces.

#![warn(missing_docs)]

mod channels;
mod collaborators;
mod config;
mod controller_traits;
mod error;
mod events;
mod notification;
mod proof;
mod types;

pub use channels::ObligationChannels;
pub use collaborators::{SectorStore, TransactionBroadcaster};
pub use config::ObligationConfig;
pub use controller_traits::{ObligationController, ObligationManager};
pub use error::{ObligationError, ObligationResult};
pub use events::ObligationEvent;
pub use notification::{AppliedBlock, ChainChangeNotification, RevertedBlock};
pub use proof::{ProofTransaction, ProofTransactionDeserializer, ProofTransactionSerializer};
pub use types::{
    ConfirmationStatus, FailureCause, ObligationResolution, ObligationRevision, ObligationStatus,
    ObligationTerms, StorageObligation, StorageObligationDeserializer, StorageObligationSerializer,
};

/// Tests utils
#[cfg(feature = "test-exports")]
pub mod test_exports;
