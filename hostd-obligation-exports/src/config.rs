// Copyright (c) 2022 MASSA LABS <info@massa.net>

use hostd_models::currency::Currency;
use std::time::Duration;

/// Configuration of the obligation core. The proof-window and forfeiture
/// bounds are deployment policy, not protocol constants.
#[derive(Debug, Clone)]
pub struct ObligationConfig {
    /// number of blocks before an obligation's expiration height at which
    /// its proof submission window opens
    pub proof_window: u64,
    /// number of blocks to wait for a submitted proof to confirm before
    /// the scheduler may rebuild and resubmit it
    pub proof_retry_period: u64,
    /// wall-clock period between two proof scheduler passes
    pub proof_check_period: Duration,
    /// number of blocks a terminal obligation stays in the active set
    /// before being moved to the archive records
    pub retention_period: u64,
    /// total collateral the host is willing to lock across all obligations
    pub collateral_budget: Currency,
    /// maximum number of revisions kept per obligation
    pub max_revisions: u64,
    /// maximum number of sector roots per revision
    pub max_sector_roots: u64,
}

impl Default for ObligationConfig {
    fn default() -> Self {
        Self {
            proof_window: 144,
            proof_retry_period: 6,
            proof_check_period: Duration::from_secs(30),
            retention_period: 1_008,
            collateral_budget: Currency::MAX,
            max_revisions: 10_000,
            max_sector_roots: 1 << 20,
        }
    }
}
