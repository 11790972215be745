//! Breakpoint bookkeeping
//!
//! Tracks what the debugger asked the debug client to do with each
//! breakpoint and what the client answered.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::RelocatedAddress;
use crate::protocol::{BreakpointKind, BreakpointResult};

/// Lifecycle of a single breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointStatus {
    /// Requested, not yet confirmed by the debug client
    Enabled,
    /// Set in the target
    Active,
    /// Hit; the target is suspended on it
    Hit,
    /// Known but not set in any process
    Inactive,
    /// Switched off by the user
    Disabled,
    /// Removal requested
    Deleting,
    /// The debug client failed to set it
    Invalid,
}

impl fmt::Display for BreakpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enabled => "enabled",
            Self::Active => "active",
            Self::Hit => "hit",
            Self::Inactive => "inactive",
            Self::Disabled => "disabled",
            Self::Deleting => "deleting",
            Self::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
pub struct BreakpointManager {
    breakpoints: BTreeMap<(BreakpointKind, RelocatedAddress), BreakpointStatus>,
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a breakpoint; returns false if it already exists.
    pub fn add(&mut self, kind: BreakpointKind, address: RelocatedAddress) -> bool {
        if self.breakpoints.contains_key(&(kind, address)) {
            return false;
        }
        self.breakpoints.insert((kind, address), BreakpointStatus::Enabled);
        true
    }

    pub fn remove(&mut self, kind: BreakpointKind, address: RelocatedAddress) -> Option<BreakpointStatus> {
        self.breakpoints.remove(&(kind, address))
    }

    pub fn status(&self, kind: BreakpointKind, address: RelocatedAddress) -> Option<BreakpointStatus> {
        self.breakpoints.get(&(kind, address)).copied()
    }

    /// Returns false if the breakpoint is unknown.
    pub fn set_status(
        &mut self,
        kind: BreakpointKind,
        address: RelocatedAddress,
        status: BreakpointStatus,
    ) -> bool {
        match self.breakpoints.get_mut(&(kind, address)) {
            Some(current) => {
                *current = status;
                true
            }
            None => false,
        }
    }

    /// Number of breakpoints of `kind` occupying a slot in the target.
    pub fn count(&self, kind: BreakpointKind) -> usize {
        self.breakpoints
            .iter()
            .filter(|((k, _), status)| {
                *k == kind
                    && !matches!(
                        status,
                        BreakpointStatus::Inactive | BreakpointStatus::Disabled | BreakpointStatus::Invalid
                    )
            })
            .count()
    }

    pub fn breakpoints(&self, kind: BreakpointKind) -> Vec<(RelocatedAddress, BreakpointStatus)> {
        self.breakpoints
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, address), status)| (*address, *status))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Confirmation of a set request.
    pub fn apply_set_results(&mut self, kind: BreakpointKind, results: &[BreakpointResult]) {
        for result in results {
            let status = if result.error == 0 {
                BreakpointStatus::Active
            } else {
                log::warn!(
                    "Debug client could not set {} at {} (error {})",
                    kind,
                    result.address,
                    result.error
                );
                BreakpointStatus::Invalid
            };
            self.breakpoints.insert((kind, result.address), status);
        }
    }

    /// Confirmation of a remove request.
    pub fn apply_remove_results(&mut self, kind: BreakpointKind, results: &[BreakpointResult]) {
        for result in results {
            if result.error == 0 {
                self.breakpoints.remove(&(kind, result.address));
            } else {
                log::warn!(
                    "Debug client could not remove {} at {} (error {})",
                    kind,
                    result.address,
                    result.error
                );
                self.set_status(kind, result.address, BreakpointStatus::Invalid);
            }
        }
    }

    /// Record a hit. Step breakpoints are one-shot: all of them go away.
    pub fn hit(&mut self, kind: BreakpointKind, address: Option<RelocatedAddress>) {
        match kind {
            BreakpointKind::Regular => {
                if let Some(address) = address {
                    if !self.set_status(kind, address, BreakpointStatus::Hit) {
                        log::warn!("Hit unknown breakpoint at {}", address);
                    }
                }
            }
            BreakpointKind::Echo => {}
            BreakpointKind::Step => {
                self.breakpoints.retain(|(k, _), _| *k != BreakpointKind::Step);
            }
        }
    }

    /// The target continued; hit breakpoints are armed again.
    pub fn resumed(&mut self) {
        for status in self.breakpoints.values_mut() {
            if *status == BreakpointStatus::Hit {
                *status = BreakpointStatus::Active;
            }
        }
    }

    /// The process is gone: echo and step breakpoints are dropped, regular
    /// breakpoints survive as inactive.
    pub fn reset(&mut self) {
        self.breakpoints.retain(|(kind, _), _| *kind == BreakpointKind::Regular);
        for status in self.breakpoints.values_mut() {
            if *status != BreakpointStatus::Disabled {
                *status = BreakpointStatus::Inactive;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: RelocatedAddress = RelocatedAddress(0x401000);
    const B: RelocatedAddress = RelocatedAddress(0x401010);

    #[test]
    fn set_results_activate_or_invalidate() {
        let mut manager = BreakpointManager::new();
        assert!(manager.add(BreakpointKind::Regular, A));
        assert!(!manager.add(BreakpointKind::Regular, A));
        manager.add(BreakpointKind::Regular, B);

        manager.apply_set_results(
            BreakpointKind::Regular,
            &[
                BreakpointResult { address: A, error: 0 },
                BreakpointResult { address: B, error: 3 },
            ],
        );
        assert_eq!(manager.status(BreakpointKind::Regular, A), Some(BreakpointStatus::Active));
        assert_eq!(manager.status(BreakpointKind::Regular, B), Some(BreakpointStatus::Invalid));
        assert_eq!(manager.count(BreakpointKind::Regular), 1);
    }

    #[test]
    fn hit_and_resume() {
        let mut manager = BreakpointManager::new();
        manager.apply_set_results(BreakpointKind::Regular, &[BreakpointResult { address: A, error: 0 }]);
        manager.hit(BreakpointKind::Regular, Some(A));
        assert_eq!(manager.status(BreakpointKind::Regular, A), Some(BreakpointStatus::Hit));
        manager.resumed();
        assert_eq!(manager.status(BreakpointKind::Regular, A), Some(BreakpointStatus::Active));
    }

    #[test]
    fn step_hit_clears_all_step_breakpoints() {
        let mut manager = BreakpointManager::new();
        manager.add(BreakpointKind::Step, A);
        manager.add(BreakpointKind::Step, B);
        manager.add(BreakpointKind::Regular, A);
        manager.hit(BreakpointKind::Step, Some(A));
        assert!(manager.breakpoints(BreakpointKind::Step).is_empty());
        assert_eq!(manager.breakpoints(BreakpointKind::Regular).len(), 1);
    }

    #[test]
    fn reset_keeps_regular_breakpoints_inactive() {
        let mut manager = BreakpointManager::new();
        manager.add(BreakpointKind::Regular, A);
        manager.add(BreakpointKind::Echo, B);
        manager.reset();
        assert_eq!(manager.status(BreakpointKind::Regular, A), Some(BreakpointStatus::Inactive));
        assert_eq!(manager.status(BreakpointKind::Echo, B), None);
    }

    #[test]
    fn successful_removal_forgets_breakpoint() {
        let mut manager = BreakpointManager::new();
        manager.add(BreakpointKind::Echo, A);
        manager.set_status(BreakpointKind::Echo, A, BreakpointStatus::Deleting);
        manager.apply_remove_results(BreakpointKind::Echo, &[BreakpointResult { address: A, error: 0 }]);
        assert!(manager.is_empty());
    }
}
