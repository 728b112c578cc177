// Copyright (c) 2022 MASSA LABS <info@massa.net>

/// Events that are emitted by the obligation core.
#[derive(Debug, Clone)]
pub enum ObligationEvent {
    /// the consensus feed desynchronized from the persisted cursor; the
    /// supplier must resubscribe from `last_processed_cursor`
    Desync,
}
