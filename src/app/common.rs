use crate::cli::{Commands, GlobalArgs};
use crate::config::{SettingsSource, load_settings};
use crate::core::events::{Event, Operation};
use crate::core::options::{EffectiveOptions, OptionLayer};
use crate::core::outcome::LifecycleOutcome;
use crate::core::reporter::Reporter;
use crate::core::state::MachineState;
use crate::core::{Severity, operations};
use crate::core::{Fleet, SystemClock, TargetList, VBoxManage};
use crate::Result;

/// Values supplied on the command line, global flags plus the subcommand's.
pub fn command_layer(global: &GlobalArgs, command: &Commands) -> OptionLayer {
    let mut layer = OptionLayer {
        debug: flag(global.debug),
        vmlist: global.vmlist.clone(),
        vmfile: global.vmfile.clone(),
        vboxmanage: global.vboxmanage.clone(),
        log_file: global.log_file.clone(),
        ..OptionLayer::default()
    };

    match command {
        Commands::Start(args) => {
            layer.start_delay = args.start_delay;
        }
        Commands::Stop(args) => {
            layer.force = flag(args.force);
            layer.max_wait_time = args.max_wait_time;
        }
        Commands::Restart(args) => {
            layer.force = flag(args.force);
            layer.max_wait_time = args.max_wait_time;
        }
        Commands::Clone(args) => {
            layer.force = flag(args.force);
            layer.add = flag_pair(args.add, args.no_add);
            layer.restart = flag_pair(args.restart, args.no_restart);
            layer.max_wait_time = args.max_wait_time;
            layer.start_delay = args.start_delay;
        }
        Commands::Status(_) => {}
    }
    layer
}

/// A plain flag can only switch an option on.
fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

/// Load the settings file and merge the command line over it.
pub fn resolve_options(global: &GlobalArgs, cli: OptionLayer) -> Result<EffectiveOptions> {
    let source = SettingsSource::from_override(global.config.as_ref());
    let file = load_settings(&source)?;
    EffectiveOptions::resolve(file, cli)
}

/// Log the effective parameters of `operation` before it runs.
pub fn log_parameters(operation: Operation, options: &EffectiveOptions) {
    match serde_json::to_string(options) {
        Ok(json) => tracing::info!(%operation, "Parameters: {json}"),
        Err(_) => tracing::info!(%operation, "Parameters: {options:?}"),
    }
}

/// Build the real control tool and clock, resolve targets, and hand both to `f`.
pub fn with_fleet<T>(
    options: &EffectiveOptions,
    f: impl FnOnce(&mut Fleet<'_>, &TargetList, &mut TracingReporter) -> Result<T>,
) -> Result<T> {
    let mut tool = VBoxManage::new(&options.vboxmanage);
    let mut clock = SystemClock;
    let mut fleet = Fleet::new(&mut tool, &mut clock, options.timing);
    let mut reporter = TracingReporter;

    let targets =
        operations::resolve_targets(&mut fleet, &options.target_source(), Some(&mut reporter))?
            .value;
    f(&mut fleet, &targets, &mut reporter)
}

/// Log the per-machine failures of a finished operation.
pub fn summarize(outcome: &LifecycleOutcome) {
    if outcome.nothing_to_do {
        return;
    }
    let failed: Vec<String> = outcome
        .failures()
        .map(|action| format!("{} ({})", action.vm, action.kind.describe()))
        .collect();
    if !failed.is_empty() {
        tracing::warn!(
            operation = %outcome.operation,
            "{} of {} actions failed: {}",
            failed.len(),
            outcome.actions.len(),
            failed.join(", ")
        );
    }
}

/// Forwards engine events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, event: Event) {
        match event {
            Event::Message { severity, text } => match severity {
                Severity::Debug => tracing::debug!("{text}"),
                Severity::Info => tracing::info!("{text}"),
                Severity::Warning => tracing::warn!("{text}"),
            },
            Event::CommandIssued { command } => tracing::debug!("Executing: {command}"),
            Event::CommandFinished {
                command,
                ok,
                output,
            } => {
                for line in output.lines() {
                    tracing::debug!("{line}");
                }
                if !ok {
                    tracing::debug!("Command failed: {command}");
                }
            }
            Event::Skipped { vm, state } => match state {
                MachineState::Running => tracing::info!("Skipping {vm}, already running!"),
                MachineState::Halted => tracing::info!("Skipping {vm}, already stopped!"),
            },
            Event::ActionAttempted { vm, action } => {
                tracing::info!("Attempting to {} vm: {vm}", action.describe());
            }
            Event::ActionFailed { vm, action, detail } => {
                tracing::warn!("{}: {vm}: {detail}", action.failure_text());
            }
            Event::StartDelayTick {
                total_minutes,
                remaining_minutes,
            } => tracing::info!(
                "Sleeping for {total_minutes} minutes, {remaining_minutes} remaining..."
            ),
            Event::HaltWaiting {
                remaining,
                seconds_left,
            } => {
                let left = seconds_left
                    .map(|secs| secs.to_string())
                    .unwrap_or_else(|| "inf".to_string());
                tracing::info!(
                    "Waiting for VMs to power down, {left} seconds remaining... {remaining:?}"
                );
            }
            Event::StopRetried { vms } => {
                tracing::info!("Retrying stop command for {vms:?}...");
            }
            Event::HaltConfirmed => tracing::info!("All VMs have halted."),
            Event::HaltTimedOut { remaining } => tracing::info!(
                "Max wait time exceeded with {remaining:?} still running; continuing..."
            ),
            Event::NothingToDo { operation } => {
                tracing::info!(%operation, "No VMs left in list; nothing to {operation}.");
            }
        }
    }
}
