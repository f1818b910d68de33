//! Generation guard for overlapping historical loads.
//!
//! Every load request takes a ticket. Only the newest ticket may commit;
//! a slower, older load that finishes later is discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Proof that a load was started at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct LoadGeneration {
    current: AtomicU64,
    in_flight: AtomicBool,
}

impl LoadGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load. Supersedes any load still running.
    pub fn begin(&self) -> LoadTicket {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.in_flight.store(true, Ordering::SeqCst);
        LoadTicket { generation }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.current.load(Ordering::SeqCst) == ticket.generation
    }

    /// Mark a load done. Returns false if a newer load replaced it.
    pub fn finish(&self, ticket: LoadTicket) -> bool {
        if !self.is_current(&ticket) {
            tracing::debug!(
                "Discarding superseded load {} (current {})",
                ticket.generation,
                self.generation()
            );
            return false;
        }
        self.in_flight.store(false, Ordering::SeqCst);
        true
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}
