// Copyright (c) 2022 MASSA LABS <info@massa.net>

use hostd_models::currency::Currency;
use hostd_obligation_exports::{ObligationError, ObligationResult};
use parking_lot::Mutex;

/// Ledger of the collateral locked across all obligations, bounded by the
/// configured budget. Lock and release happen only on obligation state
/// transitions, never retroactively.
pub(crate) struct CollateralVault {
    budget: Currency,
    locked: Mutex<Currency>,
}

impl CollateralVault {
    /// Creates a vault with the given budget and the collateral already
    /// locked by the obligations replayed at startup.
    pub fn new(budget: Currency, already_locked: Currency) -> Self {
        Self {
            budget,
            locked: Mutex::new(already_locked),
        }
    }

    /// Locks `amount` against the budget, failing with
    /// `InsufficientCollateral` when the host's liquidity cannot cover it.
    pub fn lock(&self, amount: Currency) -> ObligationResult<()> {
        let mut locked = self.locked.lock();
        let new_locked = locked.checked_add(amount).ok_or_else(|| {
            ObligationError::InsufficientCollateral(format!(
                "locking {} overflows the collateral ledger",
                amount
            ))
        })?;
        if new_locked > self.budget {
            return Err(ObligationError::InsufficientCollateral(format!(
                "locking {} exceeds the remaining budget ({} of {} already locked)",
                amount, *locked, self.budget
            )));
        }
        *locked = new_locked;
        Ok(())
    }

    /// Re-locks collateral when a consensus revert un-resolves a terminal
    /// obligation. Not bounded by the budget: the collateral was locked
    /// before the terminal transition released it.
    pub fn relock(&self, amount: Currency) {
        let mut locked = self.locked.lock();
        *locked = locked.saturating_add(amount);
    }

    /// Releases collateral on a terminal transition.
    pub fn release(&self, amount: Currency) {
        let mut locked = self.locked.lock();
        *locked = locked.saturating_sub(amount);
    }

    /// Currently locked collateral.
    pub fn locked(&self) -> Currency {
        *self.locked.lock()
    }
}
