use super::events::{ActionKind, Event, Operation};
use super::state::MachineState;
use super::targets::TargetList;

/// Result wrapper returned by high-level operations.
pub type OperationResult<T> = crate::error::Result<OperationOutput<T>>;

/// Envelope for successful operation outcomes.
#[derive(Debug)]
pub struct OperationOutput<T> {
    /// Primary value produced by the operation.
    pub value: T,
    /// Events captured during the run. Empty when a reporter received them
    /// live.
    pub events: Vec<Event>,
}

impl<T> OperationOutput<T> {
    /// Create a new operation output.
    pub fn new(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    /// Attach events to the output.
    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }
}

/// Outcome of `start`, `stop`, `restart` and `clone`.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleOutcome {
    pub operation: Operation,
    /// Targets the operation acted on, after state filtering.
    pub targets: TargetList,
    /// Every per-machine action in issue order.
    pub actions: Vec<MachineAction>,
    /// Result of halt confirmation, when the operation stops machines.
    pub halt: Option<HaltOutcome>,
    /// Set when filtering left nothing to act on.
    pub nothing_to_do: bool,
}

impl LifecycleOutcome {
    pub(crate) fn new(operation: Operation) -> Self {
        Self {
            operation,
            targets: TargetList::new(),
            actions: Vec::new(),
            halt: None,
            nothing_to_do: false,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &MachineAction> {
        self.actions.iter().filter(|action| !action.ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineAction {
    pub vm: String,
    pub kind: ActionKind,
    pub ok: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltOutcome {
    /// Confirmation was not requested.
    Skipped,
    /// Every target was observed halted.
    Confirmed,
    /// The wait bound elapsed first.
    TimedOut,
}

impl HaltOutcome {
    pub fn converged(self) -> bool {
        !matches!(self, HaltOutcome::TimedOut)
    }
}

/// Outcome of `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOutcome {
    pub rows: Vec<VmStatusRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmStatusRow {
    pub name: String,
    pub state: MachineState,
}
