//! Server lifecycle state machine.

use std::sync::atomic::{AtomicU8, Ordering};

use thiserror::Error;

use crate::events::ProcessState;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot move from {from} to {to}")]
pub struct Conflict {
    pub from: ProcessState,
    pub to: ProcessState,
}

/// Thread-safe holder for a server's current `ProcessState`, enforcing the
/// lifecycle's legal transitions.
///
/// ```text
/// absent -> installing -> offline -> starting -> online -> stopping -> offline
///              \-> install_failed            starting/online/stopping -> error -> offline
/// ```
#[derive(Debug)]
pub struct ServerState {
    current: AtomicU8,
}

impl ServerState {
    pub fn new(initial: ProcessState) -> Self {
        Self {
            current: AtomicU8::new(initial as u8),
        }
    }

    pub fn get(&self) -> ProcessState {
        decode(self.current.load(Ordering::SeqCst))
    }

    /// Attempt to move to `to`. On success the new state is stored and
    /// returned; on an illegal transition the state is left untouched.
    pub fn transition(&self, to: ProcessState) -> Result<ProcessState, Conflict> {
        loop {
            let current_raw = self.current.load(Ordering::SeqCst);
            let current = decode(current_raw);

            if !is_legal(current, to) {
                return Err(Conflict { from: current, to });
            }

            if self
                .current
                .compare_exchange(current_raw, to as u8, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(to);
            }
            // Lost the race with a concurrent transition, re-check from the new state.
        }
    }

    /// True while a lifecycle transition should block a concurrent power action.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.get(),
            ProcessState::Installing | ProcessState::Starting | ProcessState::Stopping
        )
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ProcessState::Absent)
    }
}

impl Clone for ServerState {
    fn clone(&self) -> Self {
        Self {
            current: AtomicU8::new(self.current.load(Ordering::SeqCst)),
        }
    }
}

fn decode(raw: u8) -> ProcessState {
    match raw {
        x if x == ProcessState::Absent as u8 => ProcessState::Absent,
        x if x == ProcessState::Installing as u8 => ProcessState::Installing,
        x if x == ProcessState::InstallFailed as u8 => ProcessState::InstallFailed,
        x if x == ProcessState::Offline as u8 => ProcessState::Offline,
        x if x == ProcessState::Starting as u8 => ProcessState::Starting,
        x if x == ProcessState::Online as u8 => ProcessState::Online,
        x if x == ProcessState::Stopping as u8 => ProcessState::Stopping,
        _ => ProcessState::Error,
    }
}

fn is_legal(from: ProcessState, to: ProcessState) -> bool {
    use ProcessState::*;

    if from == to {
        return false;
    }

    match (from, to) {
        (Absent, Installing) => true,
        (Installing, Offline) => true,
        (Installing, InstallFailed) => true,
        (InstallFailed, Installing) => true,
        (Offline, Installing) => true,
        (Offline, Starting) => true,
        (Starting, Online) => true,
        (Starting, Offline) => true,
        (Starting, Error) => true,
        (Online, Stopping) => true,
        (Online, Error) => true,
        (Online, Offline) => true,
        (Stopping, Offline) => true,
        (Stopping, Error) => true,
        (Error, Offline) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_absent() {
        let state = ServerState::default();
        assert_eq!(state.get(), ProcessState::Absent);
        assert!(!state.is_busy());
    }

    #[test]
    fn full_happy_path_transitions() {
        let state = ServerState::new(ProcessState::Absent);
        assert_eq!(state.transition(ProcessState::Installing).unwrap(), ProcessState::Installing);
        assert!(state.is_busy());
        assert_eq!(state.transition(ProcessState::Offline).unwrap(), ProcessState::Offline);
        assert_eq!(state.transition(ProcessState::Starting).unwrap(), ProcessState::Starting);
        assert_eq!(state.transition(ProcessState::Online).unwrap(), ProcessState::Online);
        assert_eq!(state.transition(ProcessState::Stopping).unwrap(), ProcessState::Stopping);
        assert_eq!(state.transition(ProcessState::Offline).unwrap(), ProcessState::Offline);
    }

    #[test]
    fn rejects_illegal_transition() {
        let state = ServerState::new(ProcessState::Offline);
        let err = state.transition(ProcessState::Online).unwrap_err();
        assert_eq!(err, Conflict { from: ProcessState::Offline, to: ProcessState::Online });
        assert_eq!(state.get(), ProcessState::Offline);
    }

    #[test]
    fn install_failure_allows_retry() {
        let state = ServerState::new(ProcessState::Installing);
        assert_eq!(state.transition(ProcessState::InstallFailed).unwrap(), ProcessState::InstallFailed);
        assert_eq!(state.transition(ProcessState::Installing).unwrap(), ProcessState::Installing);
    }

    #[test]
    fn error_recovers_only_to_offline() {
        let state = ServerState::new(ProcessState::Online);
        assert_eq!(state.transition(ProcessState::Error).unwrap(), ProcessState::Error);
        assert!(state.transition(ProcessState::Online).is_err());
        assert_eq!(state.transition(ProcessState::Offline).unwrap(), ProcessState::Offline);
    }

    #[test]
    fn same_state_transition_is_rejected() {
        let state = ServerState::new(ProcessState::Offline);
        assert!(state.transition(ProcessState::Offline).is_err());
    }
}
