use std::fmt;

use super::diagnostics::Severity;
use super::state::MachineState;

/// Structured event emitted while an operation runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A textual progress update with a severity level.
    Message {
        /// Severity of the message.
        severity: Severity,
        /// Human-readable text.
        text: String,
    },
    /// A control-tool command is about to run.
    CommandIssued {
        /// Rendered command line.
        command: String,
    },
    /// A control-tool command finished.
    CommandFinished {
        /// Rendered command line.
        command: String,
        /// Whether the tool reported success.
        ok: bool,
        /// Normalized output text.
        output: String,
    },
    /// A candidate was dropped because it is not in the requested state.
    Skipped {
        /// Name of the VM.
        vm: String,
        /// State the VM is currently in.
        state: MachineState,
    },
    /// A per-machine action is being attempted.
    ActionAttempted {
        /// Name of the VM.
        vm: String,
        /// Action being attempted.
        action: ActionKind,
    },
    /// A per-machine action failed; the operation continues.
    ActionFailed {
        /// Name of the VM.
        vm: String,
        /// Action that failed.
        action: ActionKind,
        /// Tool output describing the failure.
        detail: String,
    },
    /// One unit of the inter-start delay is elapsing.
    StartDelayTick {
        /// Configured delay in minutes.
        total_minutes: u64,
        /// Minutes left, including the one now elapsing.
        remaining_minutes: u64,
    },
    /// Still waiting for machines to halt.
    HaltWaiting {
        /// Machines still running.
        remaining: Vec<String>,
        /// Seconds left before giving up; `None` when the wait is unbounded.
        seconds_left: Option<u64>,
    },
    /// The stop command is re-issued to machines that are still running.
    StopRetried {
        /// Machines the stop command is re-sent to.
        vms: Vec<String>,
    },
    /// Every target was observed halted.
    HaltConfirmed,
    /// The wait bound elapsed with machines still running.
    HaltTimedOut {
        /// Machines still running at the deadline.
        remaining: Vec<String>,
    },
    /// Nothing is left to act on after filtering.
    NothingToDo {
        /// Operation that short-circuited.
        operation: Operation,
    },
}

/// Per-machine action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Start,
    Stop,
    Reset,
    Clone,
}

impl ActionKind {
    pub fn describe(self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Reset => "hard restart",
            ActionKind::Clone => "clone",
        }
    }

    pub fn failure_text(self) -> &'static str {
        match self {
            ActionKind::Start => "Failed to boot vm",
            ActionKind::Stop => "Failed to stop vm",
            ActionKind::Reset => "Failed to restart vm",
            ActionKind::Clone => "Failed to clone vm",
        }
    }
}

/// Top-level lifecycle operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Restart,
    Clone,
    Status,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
            Operation::Clone => "clone",
            Operation::Status => "status",
        };
        f.write_str(name)
    }
}
