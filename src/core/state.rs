use std::fmt;

use super::targets::TargetList;

/// Power state of a machine, always derived from a fresh listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    Halted,
}

impl MachineState {
    pub fn of(name: &str, running: &[String]) -> Self {
        if running.iter().any(|vm| vm == name) {
            MachineState::Running
        } else {
            MachineState::Halted
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineState::Running => f.write_str("running"),
            MachineState::Halted => f.write_str("halted"),
        }
    }
}

/// Split `candidates` against the live running set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Candidates in the wanted state, in candidate order.
    pub kept: TargetList,
    /// Candidates dropped, with their actual state.
    pub skipped: Vec<(String, MachineState)>,
}

/// Keep the candidates whose live state is `want`. Builds a fresh list and
/// leaves `candidates` untouched.
pub fn classify(candidates: &TargetList, running: &[String], want: MachineState) -> Partition {
    let mut kept = TargetList::new();
    let mut skipped = Vec::new();
    for name in candidates {
        let state = MachineState::of(name, running);
        if state == want {
            kept.push(name);
        } else {
            skipped.push((name.clone(), state));
        }
    }
    Partition { kept, skipped }
}
