//! Lifecycle orchestration engine, independent of the CLI.

pub mod clock;
pub mod diagnostics;
pub mod events;
pub mod invoker;
pub mod listing;
pub mod options;
pub mod outcome;
pub mod reporter;
pub mod state;
pub mod targets;

pub mod operations;

pub use clock::{Clock, SystemClock};
pub use diagnostics::Severity;
pub use events::{ActionKind, Event, Operation};
pub use invoker::{ControlTool, Invocation, PowerAction, ToolCommand, VBoxManage};
pub use operations::{Fleet, clone, resolve_targets, restart, start, status, stop};
pub use options::{
    CloneOptions, EffectiveOptions, HaltWait, OptionLayer, RestartOptions, StartDelay,
    StartOptions, StopOptions, Timing,
};
pub use outcome::{
    HaltOutcome, LifecycleOutcome, MachineAction, OperationOutput, OperationResult,
    StatusOutcome, VmStatusRow,
};
pub use reporter::Reporter;
pub use state::MachineState;
pub use targets::{TargetList, TargetSource};
