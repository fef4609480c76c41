//! Single-winner purchase race coordination
//!
//! Dozens of workers race toward the same listing; exactly one submission
//! may ever count as the win. The won state is a set-once cell: `try_win`
//! is an atomic compare-and-set that returns true to the single caller
//! performing the transition, and `has_won` is the cheap read every worker
//! consults before each expensive step so losers abandon early.

use std::sync::OnceLock;

/// Shared race state for one sniper run.
///
/// Transitions unwon -> won-by-signature at most once; never resets.
#[derive(Debug, Default)]
pub struct RaceCoordinator {
    winner: OnceLock<String>,
}

impl RaceCoordinator {
    pub fn new() -> Self {
        Self {
            winner: OnceLock::new(),
        }
    }

    /// Attempt the unwon -> won transition.
    ///
    /// Returns true only to the single caller that performs it, no matter
    /// how many workers call concurrently.
    pub fn try_win(&self, signature: impl Into<String>) -> bool {
        self.winner.set(signature.into()).is_ok()
    }

    /// Cheap check used as an early-exit before expensive network calls
    pub fn has_won(&self) -> bool {
        self.winner.get().is_some()
    }

    /// The feed signature that led to the winning purchase, once won
    pub fn winner(&self) -> Option<&str> {
        self.winner.get().map(String::as_str)
    }
}
