// Copyright (c) 2022 MASSA LABS <info@massa.net>

use hostd_models::block_height::BlockHeight;
use hostd_models::block_id::BlockId;
use hostd_models::transaction_id::TransactionId;

/// A block that became canonical.
#[derive(Debug, Clone)]
pub struct AppliedBlock {
    /// id of the block
    pub id: BlockId,
    /// id of its parent
    pub parent: BlockId,
    /// height of the block
    pub height: BlockHeight,
    /// transactions confirmed by this block that may concern obligations
    pub transactions: Vec<TransactionId>,
}

/// A previously-canonical block that was reverted.
#[derive(Debug, Clone)]
pub struct RevertedBlock {
    /// id of the block
    pub id: BlockId,
    /// id of its parent
    pub parent: BlockId,
    /// height of the block
    pub height: BlockHeight,
}

/// One ordered consensus change: the blocks reverted since the previous
/// notification (delivered tip-first) followed by the blocks applied
/// (delivered in ascending block order). The supplier must deliver
/// notifications starting exactly after the core's persisted cursor.
#[derive(Debug, Clone)]
pub struct ChainChangeNotification {
    /// reverted blocks, newest first
    pub reverted: Vec<RevertedBlock>,
    /// applied blocks, in original block order
    pub applied: Vec<AppliedBlock>,
}
