//! Log-volume control for repeated status reads.
//!
//! Status words are typically polled many times per second and rarely
//! change. [`StatusFilter`] decides, for each successful status read, whether
//! the bytes go into the communication log in full, as a short "same as last"
//! note, or not at all. It never changes what the caller receives.
//!
//! Snapshots are kept per [`Address`], so polling two status blocks does not
//! make either look changed.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::memory::Address;

/// Policy for logging status reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StatusLogRule {
    /// Log every read in full.
    #[default]
    LogAll,
    /// Log in full only when the bytes differ from the previous logged read.
    LogOnlyOnChange,
    /// Log in full on change, and a short note otherwise.
    LogChangeAndSimpleSameReceive,
    /// Do not log status reads.
    LogNothing,
}

/// What to record for one status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDecision {
    /// Record the full payload.
    Full,
    /// Record a note without payload.
    Unchanged,
    /// Record nothing.
    Skip,
}

/// Per-address snapshots of the last logged status bytes.
#[derive(Debug, Default)]
pub struct StatusFilter {
    snapshots: Mutex<HashMap<Address, Vec<u8>>>,
}

impl StatusFilter {
    /// Creates a filter with no snapshots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides what to log for `bytes` read from `address` under `rule`,
    /// updating the snapshot when the bytes are logged in full.
    ///
    /// An empty snapshot counts as no snapshot.
    ///
    /// # Example
    ///
    /// ```
    /// use s7_gate::{Address, StatusDecision, StatusFilter, StatusLogRule};
    ///
    /// let filter = StatusFilter::new();
    /// let rule = StatusLogRule::LogChangeAndSimpleSameReceive;
    /// let addr = Address::db(10, 0);
    ///
    /// assert_eq!(filter.evaluate(rule, addr, &[1, 2]), StatusDecision::Full);
    /// assert_eq!(filter.evaluate(rule, addr, &[1, 2]), StatusDecision::Unchanged);
    /// assert_eq!(filter.evaluate(rule, addr, &[1, 3]), StatusDecision::Full);
    /// ```
    pub fn evaluate(&self, rule: StatusLogRule, address: Address, bytes: &[u8]) -> StatusDecision {
        let on_same = match rule {
            StatusLogRule::LogAll => return StatusDecision::Full,
            StatusLogRule::LogNothing => return StatusDecision::Skip,
            StatusLogRule::LogOnlyOnChange => StatusDecision::Skip,
            StatusLogRule::LogChangeAndSimpleSameReceive => StatusDecision::Unchanged,
        };

        let mut snapshots = self.snapshots.lock();
        let same = snapshots
            .get(&address)
            .is_some_and(|last| !last.is_empty() && last.as_slice() == bytes);
        if same {
            return on_same;
        }
        snapshots.insert(address, bytes.to_vec());
        StatusDecision::Full
    }

    /// Returns the last logged bytes for `address`.
    pub fn snapshot(&self, address: Address) -> Option<Vec<u8>> {
        self.snapshots.lock().get(&address).cloned()
    }

    /// Forgets all snapshots; the next read of every address logs in full.
    pub fn reset(&self) {
        self.snapshots.lock().clear();
    }
}
