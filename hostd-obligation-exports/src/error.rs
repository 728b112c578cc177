// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use hostd_db_exports::HostDBError;
use hostd_models::obligation_id::ObligationId;
use hostd_models::ModelsError;
use hostd_signature::HostSignatureError;
use thiserror::Error;

/// obligation result
pub type ObligationResult<T, E = ObligationError> = core::result::Result<T, E>;

/// obligation error
#[non_exhaustive]
#[derive(Display, Error, Debug)]
pub enum ObligationError {
    /// invalid revision or terms: {0}
    ValidationError(String),
    /// obligation {0} not found
    NotFound(ObligationId),
    /// an obligation with identifier {0} already exists
    DuplicateIdentifier(ObligationId),
    /// cannot lock the required collateral: {0}
    InsufficientCollateral(String),
    /// persistence error: {0}
    PersistenceError(#[from] HostDBError),
    /// consensus notification inconsistent with the current cursor: {0}
    ConsensusDesync(String),
    /// broadcast error: {0}
    BroadcastError(String),
    /// sector store error: {0}
    SectorStore(String),
    /// signature error: {0}
    SignatureError(#[from] HostSignatureError),
    /// models error: {0}
    ModelsError(#[from] ModelsError),
}
