//! Rewrap state machine.
//!
//! Replaces the callback-and-posted-runnable flow of interactive shells
//! with four explicit states advanced by the driver: a rewrap begins,
//! runs its (possibly parallel) sub-row counting, and either finishes
//! into a new map or is cancelled and keeps the previous one.

use tracing::debug;

/// State of the rewrap machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewrapState {
    #[default]
    Idle,
    Running,
    Cancelling,
    Finishing,
}

/// Tracks rewrap progress through its states. Transitions are invoked by
/// the driver only; invalid transitions are rejected so a stale callback
/// can never corrupt the map.
#[derive(Debug, Default)]
pub struct RewrapController {
    state: RewrapState,
}

impl RewrapController {
    pub fn state(&self) -> RewrapState {
        self.state
    }

    /// Idle → Running. Fails while another rewrap is in flight.
    pub fn begin(&mut self) -> bool {
        if self.state == RewrapState::Idle {
            self.state = RewrapState::Running;
            true
        } else {
            false
        }
    }

    /// Running → Cancelling.
    pub fn cancel(&mut self) -> bool {
        if self.state == RewrapState::Running {
            self.state = RewrapState::Cancelling;
            true
        } else {
            false
        }
    }

    /// Running → Finishing, after the counting phase joined.
    pub fn finish(&mut self) -> bool {
        if self.state == RewrapState::Running {
            self.state = RewrapState::Finishing;
            true
        } else {
            false
        }
    }

    /// Finishing or Cancelling → Idle, once the map was published or
    /// discarded.
    pub fn settle(&mut self) {
        debug!(state = ?self.state, "rewrap settling");
        self.state = RewrapState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_cycle() {
        let mut ctl = RewrapController::default();
        assert_eq!(ctl.state(), RewrapState::Idle);
        assert!(ctl.begin());
        assert!(ctl.finish());
        ctl.settle();
        assert_eq!(ctl.state(), RewrapState::Idle);
    }

    #[test]
    fn cancel_cycle() {
        let mut ctl = RewrapController::default();
        assert!(ctl.begin());
        assert!(ctl.cancel());
        assert!(!ctl.finish());
        ctl.settle();
        assert_eq!(ctl.state(), RewrapState::Idle);
    }

    #[test]
    fn begin_rejected_while_running() {
        let mut ctl = RewrapController::default();
        assert!(ctl.begin());
        assert!(!ctl.begin());
    }
}
