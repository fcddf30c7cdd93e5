//! Phase progression and the backtracking table.
//!
//! The phase is the index of the next unconsumed waypoint. Elapsed time
//! advances it; every consumed waypoint leaves an undo record so a later
//! rollback restores the timing exactly.

use std::collections::VecDeque;

use tracing::debug;

use crate::{Result, TimingError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Undo record for one consumed waypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BacktrackEntry {
    /// Phase before the advance.
    pub phase: usize,
    /// Time gap left over after consuming the waypoint.
    pub gap: f64,
    /// Duration of the consumed segment.
    pub tau: f64,
    /// Duration of the following segment at the time of the advance.
    pub next_tau: Option<f64>,
}

/// Bounded stack of [`BacktrackEntry`] records. The oldest entry is
/// discarded once the capacity is reached.
#[derive(Debug, Clone, Default)]
pub struct BacktrackTable {
    entries: VecDeque<BacktrackEntry>,
    capacity: Option<usize>,
}

impl BacktrackTable {
    /// Create a table holding at most `capacity` entries (`None` = unbounded).
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Record an advance.
    pub fn push(&mut self, entry: BacktrackEntry) {
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap {
                self.entries.pop_front();
            }
        }
        self.entries.push_back(entry);
    }

    /// Remove and return the newest entry.
    pub fn pop(&mut self) -> Option<BacktrackEntry> {
        self.entries.pop_back()
    }

    /// Newest entry.
    #[must_use]
    pub fn last(&self) -> Option<&BacktrackEntry> {
        self.entries.back()
    }

    /// Drop every entry recorded at `phase` or later.
    pub fn prune_from(&mut self, phase: usize) {
        self.entries.retain(|e| e.phase < phase);
    }

    /// Forget the recorded durations of segments at `phase` or later, so
    /// undoing an advance leaves those segments as they are now.
    ///
    /// Entries recorded at `phase` or later are expected to be pruned
    /// already; only their following-segment durations are touched here.
    pub fn forget_durations_from(&mut self, phase: usize) {
        for entry in self.entries.iter_mut().filter(|e| e.phase + 1 >= phase) {
            entry.next_tau = None;
        }
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing can be undone.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries, if bounded.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &BacktrackEntry> {
        self.entries.iter()
    }
}

/// Execution state of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PhaseState {
    /// Waypoints remain.
    Active,
    /// Every waypoint has been consumed.
    Done,
}

/// Tracks the phase and owns the backtracking table.
///
/// Durations are passed in by the owner so the controller stays independent
/// of how the plan stores them.
#[derive(Debug, Clone)]
pub struct PhaseController {
    phase: usize,
    tau_min: f64,
    table: BacktrackTable,
}

impl PhaseController {
    /// Create a controller at phase 0.
    #[must_use]
    pub fn new(tau_min: f64, max_backtrack_depth: Option<usize>) -> Self {
        Self {
            phase: 0,
            tau_min,
            table: BacktrackTable::new(max_backtrack_depth),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> usize {
        self.phase
    }

    /// State for a plan of `len` waypoints.
    #[must_use]
    pub fn state(&self, len: usize) -> PhaseState {
        if self.phase >= len {
            PhaseState::Done
        } else {
            PhaseState::Active
        }
    }

    /// Undo records.
    #[must_use]
    pub fn table(&self) -> &BacktrackTable {
        &self.table
    }

    /// Consume `gap` seconds of the plan whose durations are `tau`.
    ///
    /// Whole segments are consumed while the gap covers them; the remainder
    /// shortens the current segment, never below `tau_min`. Returns the
    /// number of waypoints consumed.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::InvalidGap`] for a negative or non-finite gap.
    pub fn progress(&mut self, tau: &mut [f64], gap: f64) -> Result<usize> {
        if !(gap.is_finite() && gap >= 0.0) {
            return Err(TimingError::InvalidGap(gap));
        }

        let mut remaining = gap;
        let mut consumed = 0;
        while self.phase < tau.len() {
            let current = tau[self.phase];
            if remaining < current {
                tau[self.phase] = (current - remaining).max(self.tau_min);
                break;
            }
            remaining -= current;
            self.table.push(BacktrackEntry {
                phase: self.phase,
                gap: remaining,
                tau: current,
                next_tau: tau.get(self.phase + 1).copied(),
            });
            self.phase += 1;
            consumed += 1;
        }

        if consumed > 0 {
            debug!(
                gap,
                consumed,
                phase = self.phase,
                depth = self.table.len(),
                "advanced phase"
            );
        }
        Ok(consumed)
    }

    /// Undo the newest advance, restoring the phase and the durations it
    /// touched.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::BacktrackUnderflow`] if the table is empty; the
    /// state is left unchanged.
    pub fn backtrack(&mut self, tau: &mut [f64]) -> Result<BacktrackEntry> {
        let entry = self.table.pop().ok_or(TimingError::BacktrackUnderflow)?;
        self.phase = entry.phase;
        if let Some(t) = tau.get_mut(entry.phase) {
            *t = entry.tau;
        }
        if let (Some(next), Some(t)) = (entry.next_tau, tau.get_mut(entry.phase + 1)) {
            *t = next;
        }
        debug!(phase = self.phase, depth = self.table.len(), "backtracked");
        Ok(entry)
    }

    /// The waypoints from the current phase on were replaced: undo records
    /// keep restoring consumed segments but no longer touch the new suffix.
    pub fn detach_suffix(&mut self) {
        self.table.forget_durations_from(self.phase);
    }

    /// Jump to `phase_to` in a plan of `len` waypoints, discarding undo
    /// records that point at or beyond it.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::PhaseOutOfRange`] if `phase_to > len`.
    pub fn set_phase(&mut self, phase_to: usize, len: usize) -> Result<()> {
        if phase_to > len {
            return Err(TimingError::PhaseOutOfRange {
                phase: phase_to,
                len,
            });
        }
        self.phase = phase_to;
        self.table.prune_from(phase_to);
        Ok(())
    }
}
