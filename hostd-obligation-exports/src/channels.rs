// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crossbeam_channel::Sender;
use std::sync::Arc;

use crate::collaborators::{SectorStore, TransactionBroadcaster};
use crate::events::ObligationEvent;

/// Contains the external collaborators the obligation workers talk to and
/// the channel used to report events back to the embedding daemon.
#[derive(Clone)]
pub struct ObligationChannels {
    /// broadcast collaborator for finished proof transactions
    pub broadcaster: Arc<dyn TransactionBroadcaster>,
    /// content-addressable sector blob store
    pub sector_store: Arc<dyn SectorStore>,
    /// outgoing obligation events
    pub event_tx: Sender<ObligationEvent>,
}
