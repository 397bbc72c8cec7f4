//! One dispatcher per process.
//!
//! A [`Dispatcher`](crate::Dispatcher) is built against an [`InstanceSlot`].
//! Claiming a slot that is already taken is rejected with
//! [`ConfigurationError::AlreadyConstructed`] and a warning, never by
//! replacing the first instance. Production code uses
//! [`InstanceSlot::process`]; tests can declare their own `static` slots.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use herald_core::{ConfigurationError, ConfigurationResult};

static PROCESS_SLOT: InstanceSlot = InstanceSlot::new();

/// A single-use construction permit.
#[derive(Debug)]
pub struct InstanceSlot {
    claimed: AtomicBool,
}

impl InstanceSlot {
    /// Creates an unclaimed slot.
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
        }
    }

    /// The process-wide dispatcher slot.
    pub fn process() -> &'static InstanceSlot {
        &PROCESS_SLOT
    }

    /// Whether the slot has been claimed.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    /// Claims the slot for `what`.
    pub fn claim(&self, what: &'static str) -> ConfigurationResult<()> {
        if self.claimed.swap(true, Ordering::SeqCst) {
            warn!(what, "Already defined in this process, rejecting second instance");
            return Err(ConfigurationError::AlreadyConstructed { what });
        }
        Ok(())
    }

    /// Gives the slot back after a construction that failed part-way.
    pub(crate) fn release(&self) {
        self.claimed.store(false, Ordering::SeqCst);
    }
}

impl Default for InstanceSlot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_rejected() {
        let slot = InstanceSlot::new();
        assert!(slot.claim("dispatcher").is_ok());
        assert!(slot.is_claimed());
        assert_eq!(
            slot.claim("dispatcher"),
            Err(ConfigurationError::AlreadyConstructed { what: "dispatcher" })
        );

        slot.release();
        assert!(slot.claim("dispatcher").is_ok());
    }
}
