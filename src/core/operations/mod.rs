mod halt;
#[cfg(test)]
mod testing;

use crate::error::{Error, Result};

use super::clock::Clock;
use super::diagnostics::Severity;
use super::events::{ActionKind, Event, Operation};
use super::invoker::{ControlTool, Invocation, PowerAction, ToolCommand};
use super::listing::parse_machine_names;
use super::options::{
    CloneOptions, RestartOptions, StartDelay, StartOptions, StopOptions, Timing,
};
use super::outcome::{
    HaltOutcome, LifecycleOutcome, MachineAction, OperationOutput, OperationResult,
    StatusOutcome, VmStatusRow,
};
use super::reporter::Reporter;
use super::state::{MachineState, classify};
use super::targets::{TargetList, TargetSource};

/// The collaborators every operation drives: the control tool, a clock and
/// the polling constants.
pub struct Fleet<'a> {
    tool: &'a mut dyn ControlTool,
    clock: &'a mut dyn Clock,
    timing: Timing,
}

impl<'a> Fleet<'a> {
    pub fn new(tool: &'a mut dyn ControlTool, clock: &'a mut dyn Clock, timing: Timing) -> Self {
        Self { tool, clock, timing }
    }

    fn run(&mut self, command: ToolCommand, reporter: &mut dyn Reporter) -> Invocation {
        let rendered = command.to_string();
        reporter.report(Event::CommandIssued {
            command: rendered.clone(),
        });
        let invocation = self.tool.invoke(&command);
        reporter.report(Event::CommandFinished {
            command: rendered,
            ok: invocation.ok,
            output: invocation.output.clone(),
        });
        invocation
    }

    fn list_all(&mut self, reporter: &mut dyn Reporter) -> Result<Vec<String>> {
        let command = ToolCommand::ListVms;
        let rendered = command.to_string();
        let invocation = self.run(command, reporter);
        if !invocation.ok {
            return Err(Error::DiscoveryFailed {
                command: rendered,
                output: invocation.output,
            });
        }
        Ok(parse_machine_names(&invocation.output))
    }

    /// Names of the machines running right now. A failed query counts as
    /// "nothing running".
    fn running(&mut self, reporter: &mut dyn Reporter) -> Vec<String> {
        reporter.report(debug("Fetching running VMs..."));
        let invocation = self.run(ToolCommand::ListRunningVms, reporter);
        if !invocation.ok {
            reporter.report(Event::Message {
                severity: Severity::Warning,
                text: format!(
                    "Failed to list running VMs; treating none as running: {}",
                    invocation.output
                ),
            });
            return Vec::new();
        }
        parse_machine_names(&invocation.output)
    }

    /// Query live state once and keep the candidates in state `want`.
    fn filter(
        &mut self,
        candidates: &TargetList,
        want: MachineState,
        reporter: &mut dyn Reporter,
    ) -> TargetList {
        reporter.report(debug(format!(
            "Filtering VM list, keeping all that are {want}: {:?}",
            candidates.as_slice()
        )));
        let running = self.running(reporter);
        let partition = classify(candidates, &running, want);
        for (vm, state) in partition.skipped {
            reporter.report(Event::Skipped { vm, state });
        }
        reporter.report(debug(format!(
            "Filtered VM list: {:?}",
            partition.kept.as_slice()
        )));
        partition.kept
    }

    fn act(
        &mut self,
        vm: &str,
        kind: ActionKind,
        command: ToolCommand,
        reporter: &mut dyn Reporter,
    ) -> MachineAction {
        reporter.report(Event::ActionAttempted {
            vm: vm.to_string(),
            action: kind,
        });
        let invocation = self.run(command, reporter);
        if !invocation.ok {
            reporter.report(Event::ActionFailed {
                vm: vm.to_string(),
                action: kind,
                detail: invocation.output,
            });
        }
        MachineAction {
            vm: vm.to_string(),
            kind,
            ok: invocation.ok,
        }
    }

    fn start_one(&mut self, vm: &str, reporter: &mut dyn Reporter) -> MachineAction {
        let command = ToolCommand::StartVm {
            name: vm.to_string(),
        };
        self.act(vm, ActionKind::Start, command, reporter)
    }

    fn stop_one(
        &mut self,
        vm: &str,
        method: PowerAction,
        reporter: &mut dyn Reporter,
    ) -> MachineAction {
        let command = ToolCommand::ControlVm {
            name: vm.to_string(),
            action: method,
        };
        self.act(vm, ActionKind::Stop, command, reporter)
    }

    fn reset_one(&mut self, vm: &str, reporter: &mut dyn Reporter) -> MachineAction {
        let command = ToolCommand::ControlVm {
            name: vm.to_string(),
            action: PowerAction::Reset,
        };
        self.act(vm, ActionKind::Reset, command, reporter)
    }

    fn clone_one(
        &mut self,
        vm: &str,
        register: bool,
        reporter: &mut dyn Reporter,
    ) -> MachineAction {
        let command = ToolCommand::CloneVm {
            name: vm.to_string(),
            clone_name: clone_name(vm, self.clock.wall_clock()),
            register,
        };
        self.act(vm, ActionKind::Clone, command, reporter)
    }

    /// Start `targets` in order, pausing `delay` after each successful start
    /// except the last.
    fn start_all(
        &mut self,
        targets: &TargetList,
        delay: StartDelay,
        reporter: &mut dyn Reporter,
        actions: &mut Vec<MachineAction>,
    ) {
        for (index, vm) in targets.iter().enumerate() {
            let action = self.start_one(vm, reporter);
            let is_last = index + 1 == targets.len();
            if action.ok && !is_last {
                if let StartDelay::Minutes(total) = delay {
                    for remaining in (1..=total).rev() {
                        reporter.report(Event::StartDelayTick {
                            total_minutes: total,
                            remaining_minutes: remaining,
                        });
                        self.clock.sleep(self.timing.delay_unit);
                    }
                }
            }
            actions.push(action);
        }
    }

    /// Issue the stop command to every target, then wait for halt.
    fn stop_all(
        &mut self,
        targets: &TargetList,
        options: StopOptions,
        reporter: &mut dyn Reporter,
        actions: &mut Vec<MachineAction>,
    ) -> HaltOutcome {
        for vm in targets {
            actions.push(self.stop_one(vm, options.method, reporter));
        }
        self.await_halt(targets, options.wait, options.method, reporter, actions)
    }
}

/// `<name>_<YYYY-MM-DD_HH-MM>`.
pub fn clone_name(vm: &str, at: time::OffsetDateTime) -> String {
    let format = time::macros::format_description!("[year]-[month]-[day]_[hour]-[minute]");
    match at.format(format) {
        Ok(stamp) => format!("{vm}_{stamp}"),
        Err(_) => format!("{vm}_{}", at.unix_timestamp()),
    }
}

fn debug(text: impl Into<String>) -> Event {
    Event::Message {
        severity: Severity::Debug,
        text: text.into(),
    }
}

fn info(text: impl Into<String>) -> Event {
    Event::Message {
        severity: Severity::Info,
        text: text.into(),
    }
}

/// Resolve the target list: explicit list and VM file first, otherwise every
/// machine known to the hypervisor.
pub fn resolve_targets(
    fleet: &mut Fleet<'_>,
    source: &TargetSource,
    reporter: Option<&mut dyn Reporter>,
) -> OperationResult<TargetList> {
    let mut events = Vec::new();
    let targets = {
        let mut reporter = ReporterProxy::new(reporter, &mut events);
        let mut targets = source.collect()?;
        if targets.is_empty() {
            reporter.emit(debug("No VM list supplied; using all registered VMs."));
            targets = fleet.list_all(&mut reporter)?.into_iter().collect();
        }
        reporter.emit(debug(format!("Target VMs: {:?}", targets.as_slice())));
        targets
    };
    Ok(OperationOutput::new(targets).with_events(events))
}

pub fn start(
    fleet: &mut Fleet<'_>,
    targets: &TargetList,
    options: StartOptions,
    reporter: Option<&mut dyn Reporter>,
) -> OperationResult<LifecycleOutcome> {
    let mut events = Vec::new();
    let mut outcome = LifecycleOutcome::new(Operation::Start);
    {
        let mut reporter = ReporterProxy::new(reporter, &mut events);
        reporter.emit(info("Starting virtual machines..."));

        let halted = fleet.filter(targets, MachineState::Halted, &mut reporter);
        if halted.is_empty() {
            reporter.emit(Event::NothingToDo {
                operation: Operation::Start,
            });
            outcome.nothing_to_do = true;
        } else {
            fleet.start_all(&halted, options.delay, &mut reporter, &mut outcome.actions);
            outcome.targets = halted;
            reporter.emit(info("Finished boot sequence for all VMs."));
        }
    }
    Ok(OperationOutput::new(outcome).with_events(events))
}

pub fn stop(
    fleet: &mut Fleet<'_>,
    targets: &TargetList,
    options: StopOptions,
    reporter: Option<&mut dyn Reporter>,
) -> OperationResult<LifecycleOutcome> {
    let mut events = Vec::new();
    let mut outcome = LifecycleOutcome::new(Operation::Stop);
    {
        let mut reporter = ReporterProxy::new(reporter, &mut events);
        reporter.emit(info("Stopping virtual machines..."));

        let running = fleet.filter(targets, MachineState::Running, &mut reporter);
        if running.is_empty() {
            reporter.emit(Event::NothingToDo {
                operation: Operation::Stop,
            });
            outcome.nothing_to_do = true;
        } else {
            let halt = fleet.stop_all(&running, options, &mut reporter, &mut outcome.actions);
            outcome.halt = Some(halt);
            outcome.targets = running;
            reporter.emit(info("Finished shutdown sequence for all VMs."));
        }
    }
    Ok(OperationOutput::new(outcome).with_events(events))
}

pub fn restart(
    fleet: &mut Fleet<'_>,
    targets: &TargetList,
    options: RestartOptions,
    reporter: Option<&mut dyn Reporter>,
) -> OperationResult<LifecycleOutcome> {
    let mut events = Vec::new();
    let mut outcome = LifecycleOutcome::new(Operation::Restart);
    {
        let mut reporter = ReporterProxy::new(reporter, &mut events);
        reporter.emit(info("Restarting virtual machines..."));

        let running = fleet.filter(targets, MachineState::Running, &mut reporter);
        if running.is_empty() {
            reporter.emit(Event::NothingToDo {
                operation: Operation::Restart,
            });
            outcome.nothing_to_do = true;
        } else {
            if options.force {
                for vm in &running {
                    let action = fleet.reset_one(vm, &mut reporter);
                    outcome.actions.push(action);
                }
            } else {
                let stop = StopOptions {
                    method: PowerAction::AcpiPowerButton,
                    wait: options.wait,
                };
                let halt = fleet.stop_all(&running, stop, &mut reporter, &mut outcome.actions);
                outcome.halt = Some(halt);
                fleet.start_all(
                    &running,
                    StartDelay::None,
                    &mut reporter,
                    &mut outcome.actions,
                );
            }
            outcome.targets = running;
            reporter.emit(info("Finished reboot sequence for all VMs."));
        }
    }
    Ok(OperationOutput::new(outcome).with_events(events))
}

pub fn clone(
    fleet: &mut Fleet<'_>,
    targets: &TargetList,
    options: CloneOptions,
    reporter: Option<&mut dyn Reporter>,
) -> OperationResult<LifecycleOutcome> {
    let mut events = Vec::new();
    let mut outcome = LifecycleOutcome::new(Operation::Clone);
    {
        let mut reporter = ReporterProxy::new(reporter, &mut events);
        reporter.emit(info("Cloning virtual machines..."));

        if targets.is_empty() {
            reporter.emit(Event::NothingToDo {
                operation: Operation::Clone,
            });
            outcome.nothing_to_do = true;
        } else {
            let running = fleet.filter(targets, MachineState::Running, &mut reporter);
            if !running.is_empty() {
                let halt =
                    fleet.stop_all(&running, options.stop, &mut reporter, &mut outcome.actions);
                outcome.halt = Some(halt);
            }

            for vm in targets {
                let action = fleet.clone_one(vm, options.register, &mut reporter);
                outcome.actions.push(action);
            }

            if options.restart {
                reporter.emit(info("Restart is set; starting up VMs..."));
                fleet.start_all(targets, options.delay, &mut reporter, &mut outcome.actions);
            }
            outcome.targets = targets.clone();
            reporter.emit(info("Clone operation finished."));
        }
    }
    Ok(OperationOutput::new(outcome).with_events(events))
}

/// Live state of every target.
pub fn status(
    fleet: &mut Fleet<'_>,
    targets: &TargetList,
    reporter: Option<&mut dyn Reporter>,
) -> OperationResult<StatusOutcome> {
    let mut events = Vec::new();
    let rows = {
        let mut reporter = ReporterProxy::new(reporter, &mut events);
        let running = fleet.running(&mut reporter);
        targets
            .iter()
            .map(|name| VmStatusRow {
                name: name.clone(),
                state: MachineState::of(name, &running),
            })
            .collect()
    };
    Ok(OperationOutput::new(StatusOutcome { rows }).with_events(events))
}

pub(super) struct ReporterProxy<'a, 'b> {
    delegate: Option<&'a mut dyn Reporter>,
    events: &'b mut Vec<Event>,
}

impl<'a, 'b> ReporterProxy<'a, 'b> {
    fn new(delegate: Option<&'a mut dyn Reporter>, events: &'b mut Vec<Event>) -> Self {
        Self { delegate, events }
    }

    /// Forward to the delegate when there is one; buffer only otherwise.
    fn emit(&mut self, event: Event) {
        match &mut self.delegate {
            Some(reporter) => reporter.report(event),
            None => self.events.push(event),
        }
    }
}

impl Reporter for ReporterProxy<'_, '_> {
    fn report(&mut self, event: Event) {
        self.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::{FakeClock, FakeHypervisor, commands_of_kind};
    use super::*;
    use crate::core::options::HaltWait;

    fn targets(names: &[&str]) -> TargetList {
        names.iter().collect()
    }

    fn stop_options(force: bool, minutes: f64) -> StopOptions {
        StopOptions {
            method: PowerAction::stop(force),
            wait: HaltWait::from_minutes(minutes),
        }
    }

    #[test]
    fn start_issues_commands_in_order_without_sleeping_when_delay_disabled() {
        let mut tool = FakeHypervisor::new(&["A", "B"]);
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            start(
                &mut fleet,
                &targets(&["A", "B"]),
                StartOptions {
                    delay: StartDelay::None,
                },
                None,
            )
            .expect("start")
        };

        assert_eq!(
            commands_of_kind(&tool.log, "startvm"),
            vec![
                ToolCommand::StartVm { name: "A".into() },
                ToolCommand::StartVm { name: "B".into() },
            ]
        );
        assert!(clock.sleeps.is_empty());
        assert_eq!(output.value.actions.len(), 2);
        assert!(output.value.failures().next().is_none());
    }

    #[test]
    fn start_delays_between_successful_starts_but_not_after_the_last() {
        let mut tool = FakeHypervisor::new(&["A", "B", "C"]);
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            start(
                &mut fleet,
                &targets(&["A", "B", "C"]),
                StartOptions {
                    delay: StartDelay::Minutes(2),
                },
                None,
            )
            .expect("start")
        };

        assert_eq!(clock.sleeps, vec![Duration::from_secs(60); 4]);
        let ticks: Vec<u64> = output
            .events
            .iter()
            .filter_map(|event| match event {
                Event::StartDelayTick {
                    remaining_minutes, ..
                } => Some(*remaining_minutes),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![2, 1, 2, 1]);
    }

    #[test]
    fn start_failure_skips_delay_and_continues() {
        let mut tool = FakeHypervisor::new(&["A", "B"]);
        tool.fail_start("A");
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            start(
                &mut fleet,
                &targets(&["A", "B"]),
                StartOptions {
                    delay: StartDelay::Minutes(1),
                },
                None,
            )
            .expect("start")
        };

        assert!(clock.sleeps.is_empty());
        let failed: Vec<&str> = output
            .value
            .failures()
            .map(|action| action.vm.as_str())
            .collect();
        assert_eq!(failed, vec!["A"]);
        assert!(tool.running.contains(&"B".to_string()));
        assert!(output.events.iter().any(|event| matches!(
            event,
            Event::ActionFailed {
                action: ActionKind::Start,
                ..
            }
        )));
    }

    #[test]
    fn start_skips_running_machines_and_short_circuits_when_all_run() {
        let mut tool = FakeHypervisor::new(&["A", "B"]);
        tool.running = vec!["A".into(), "B".into()];
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            start(
                &mut fleet,
                &targets(&["A", "B"]),
                StartOptions {
                    delay: StartDelay::None,
                },
                None,
            )
            .expect("start")
        };

        assert!(output.value.nothing_to_do);
        assert!(commands_of_kind(&tool.log, "startvm").is_empty());
        assert!(output.events.contains(&Event::Skipped {
            vm: "A".into(),
            state: MachineState::Running,
        }));
    }

    #[test]
    fn stop_issues_graceful_stops_then_polls_until_halted() {
        let mut tool = FakeHypervisor::new(&["A", "B", "C"]);
        tool.running = vec!["A".into(), "B".into(), "C".into()];
        tool.halt_after_polls = 2;
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            stop(
                &mut fleet,
                &targets(&["A", "B", "C"]),
                stop_options(false, 1.0),
                None,
            )
            .expect("stop")
        };

        let stops = commands_of_kind(&tool.log, "controlvm");
        assert_eq!(stops.len(), 3);
        for (command, name) in stops.iter().zip(["A", "B", "C"]) {
            assert_eq!(
                command,
                &ToolCommand::ControlVm {
                    name: name.into(),
                    action: PowerAction::AcpiPowerButton,
                }
            );
        }
        assert_eq!(output.value.halt, Some(HaltOutcome::Confirmed));
        assert!(tool.running.is_empty());
        assert!(output.events.contains(&Event::HaltConfirmed));
    }

    #[test]
    fn forced_stop_uses_poweroff() {
        let mut tool = FakeHypervisor::new(&["A"]);
        tool.running = vec!["A".into()];
        let mut clock = FakeClock::new();
        {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            stop(&mut fleet, &targets(&["A"]), stop_options(true, 1.0), None).expect("stop");
        }
        assert_eq!(
            commands_of_kind(&tool.log, "controlvm"),
            vec![ToolCommand::ControlVm {
                name: "A".into(),
                action: PowerAction::PowerOff,
            }]
        );
    }

    #[test]
    fn stop_with_nothing_running_is_nothing_to_do() {
        let mut tool = FakeHypervisor::new(&["A"]);
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            stop(&mut fleet, &targets(&["A"]), stop_options(false, 1.0), None).expect("stop")
        };
        assert!(output.value.nothing_to_do);
        assert!(output.events.contains(&Event::NothingToDo {
            operation: Operation::Stop
        }));
    }

    #[test]
    fn forced_restart_resets_without_waiting() {
        let mut tool = FakeHypervisor::new(&["A", "B"]);
        tool.running = vec!["A".into(), "B".into()];
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            restart(
                &mut fleet,
                &targets(&["A", "B"]),
                RestartOptions {
                    force: true,
                    wait: HaltWait::from_minutes(1.0),
                },
                None,
            )
            .expect("restart")
        };

        assert_eq!(
            commands_of_kind(&tool.log, "controlvm"),
            vec![
                ToolCommand::ControlVm {
                    name: "A".into(),
                    action: PowerAction::Reset,
                },
                ToolCommand::ControlVm {
                    name: "B".into(),
                    action: PowerAction::Reset,
                },
            ]
        );
        assert!(clock.sleeps.is_empty());
        assert_eq!(output.value.halt, None);
    }

    #[test]
    fn graceful_restart_stops_confirms_and_starts_without_delay() {
        let mut tool = FakeHypervisor::new(&["A", "B", "C"]);
        tool.running = vec!["A".into(), "B".into()];
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            restart(
                &mut fleet,
                &targets(&["A", "B", "C"]),
                RestartOptions {
                    force: false,
                    wait: HaltWait::from_minutes(1.0),
                },
                None,
            )
            .expect("restart")
        };

        let kinds: Vec<(ActionKind, &str)> = output
            .value
            .actions
            .iter()
            .map(|action| (action.kind, action.vm.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ActionKind::Stop, "A"),
                (ActionKind::Stop, "B"),
                (ActionKind::Start, "A"),
                (ActionKind::Start, "B"),
            ]
        );
        assert_eq!(output.value.halt, Some(HaltOutcome::Confirmed));
        // Settle delay only; no inter-start delay.
        assert_eq!(clock.sleeps, vec![Duration::from_secs(2)]);
        assert_eq!(tool.running, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn restart_proceeds_to_start_after_halt_timeout() {
        let mut tool = FakeHypervisor::new(&["A"]);
        tool.running = vec!["A".into()];
        tool.ignore_stops = true;
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            restart(
                &mut fleet,
                &targets(&["A"]),
                RestartOptions {
                    force: false,
                    wait: HaltWait::Bounded(Duration::from_secs(10)),
                },
                None,
            )
            .expect("restart")
        };
        assert_eq!(output.value.halt, Some(HaltOutcome::TimedOut));
        assert_eq!(commands_of_kind(&tool.log, "startvm").len(), 1);
    }

    #[test]
    fn clone_stops_confirms_clones_then_restarts() {
        let mut tool = FakeHypervisor::new(&["A"]);
        tool.running = vec!["A".into()];
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            clone(
                &mut fleet,
                &targets(&["A"]),
                CloneOptions {
                    stop: stop_options(false, 1.0),
                    register: false,
                    restart: true,
                    delay: StartDelay::None,
                },
                None,
            )
            .expect("clone")
        };

        let actions: Vec<ToolCommand> = tool
            .log
            .iter()
            .filter(|command| !matches!(command, ToolCommand::ListRunningVms))
            .cloned()
            .collect();
        assert_eq!(actions.len(), 3);
        assert_eq!(
            actions[0],
            ToolCommand::ControlVm {
                name: "A".into(),
                action: PowerAction::AcpiPowerButton,
            }
        );
        match &actions[1] {
            ToolCommand::CloneVm {
                name,
                clone_name,
                register,
            } => {
                assert_eq!(name, "A");
                assert_eq!(clone_name, "A_2024-03-05_14-07");
                assert!(!register);
            }
            other => panic!("expected clone command, got {other:?}"),
        }
        assert_eq!(actions[2], ToolCommand::StartVm { name: "A".into() });

        let halt_index = output
            .events
            .iter()
            .position(|event| *event == Event::HaltConfirmed)
            .expect("halt confirmed");
        let clone_index = output
            .events
            .iter()
            .position(|event| {
                matches!(
                    event,
                    Event::ActionAttempted {
                        action: ActionKind::Clone,
                        ..
                    }
                )
            })
            .expect("clone attempted");
        assert!(halt_index < clone_index);
    }

    #[test]
    fn clone_of_halted_machines_skips_stop_and_registers() {
        let mut tool = FakeHypervisor::new(&["A", "B"]);
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            clone(
                &mut fleet,
                &targets(&["A", "B"]),
                CloneOptions {
                    stop: stop_options(false, 1.0),
                    register: true,
                    restart: false,
                    delay: StartDelay::None,
                },
                None,
            )
            .expect("clone")
        };

        assert_eq!(output.value.halt, None);
        assert!(commands_of_kind(&tool.log, "controlvm").is_empty());
        assert!(commands_of_kind(&tool.log, "startvm").is_empty());
        let clones = commands_of_kind(&tool.log, "clonevm");
        assert_eq!(clones.len(), 2);
        assert!(clones.iter().all(|command| command.args().last()
            == Some(&"--register".to_string())));
    }

    #[test]
    fn clone_restart_delays_between_starts_but_not_after_the_last() {
        let mut tool = FakeHypervisor::new(&["A", "B"]);
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            clone(
                &mut fleet,
                &targets(&["A", "B"]),
                CloneOptions {
                    stop: stop_options(false, 1.0),
                    register: false,
                    restart: true,
                    delay: StartDelay::Minutes(1),
                },
                None,
            )
            .expect("clone")
        };

        assert_eq!(clock.sleeps, vec![Duration::from_secs(60)]);
        assert_eq!(commands_of_kind(&tool.log, "startvm").len(), 2);

        let last_clone = output
            .events
            .iter()
            .rposition(|event| {
                matches!(
                    event,
                    Event::ActionAttempted {
                        action: ActionKind::Clone,
                        ..
                    }
                )
            })
            .expect("clone attempted");
        let tick = output
            .events
            .iter()
            .position(|event| matches!(event, Event::StartDelayTick { .. }))
            .expect("delay tick");
        let second_start = output
            .events
            .iter()
            .position(|event| {
                *event
                    == Event::ActionAttempted {
                        vm: "B".into(),
                        action: ActionKind::Start,
                    }
            })
            .expect("second start");
        assert!(last_clone < tick);
        assert!(tick < second_start);
    }

    #[test]
    fn unbounded_halt_wait_does_not_buffer_events_for_a_live_reporter() {
        struct Counter(usize);
        impl Reporter for Counter {
            fn report(&mut self, _event: Event) {
                self.0 += 1;
            }
        }

        let mut tool = FakeHypervisor::new(&["A"]);
        tool.running = vec!["A".into()];
        tool.halt_after_polls = 500;
        let mut clock = FakeClock::new();
        let mut counter = Counter(0);
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            stop(
                &mut fleet,
                &targets(&["A"]),
                stop_options(false, 0.0),
                Some(&mut counter),
            )
            .expect("stop")
        };

        assert_eq!(output.value.halt, Some(HaltOutcome::Confirmed));
        assert_eq!(clock.sleeps.len(), 500);
        assert!(counter.0 > 500);
        assert!(output.events.is_empty());
    }

    #[test]
    fn resolve_targets_discovers_all_machines_when_nothing_supplied() {
        let mut tool = FakeHypervisor::new(&["A", "B", "A"]);
        let mut clock = FakeClock::new();
        let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
        let output =
            resolve_targets(&mut fleet, &TargetSource::default(), None).expect("resolve");
        assert_eq!(output.value.as_slice(), ["A", "B"]);
    }

    #[test]
    fn resolve_targets_prefers_explicit_list() {
        let mut tool = FakeHypervisor::new(&["X"]);
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            let source = TargetSource {
                vmlist: Some("A, B, B".into()),
                vmfile: None,
            };
            resolve_targets(&mut fleet, &source, None).expect("resolve")
        };
        assert_eq!(output.value.as_slice(), ["A", "B"]);
        assert!(tool.log.is_empty());
    }

    #[test]
    fn failed_discovery_is_fatal() {
        let mut tool = FakeHypervisor::new(&["A"]);
        tool.fail_listing = true;
        let mut clock = FakeClock::new();
        let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
        let err = resolve_targets(&mut fleet, &TargetSource::default(), None).unwrap_err();
        assert!(matches!(err, Error::DiscoveryFailed { .. }));
    }

    #[test]
    fn failed_running_query_counts_as_nothing_running() {
        let mut tool = FakeHypervisor::new(&["A"]);
        tool.running = vec!["A".into()];
        tool.fail_running_query = true;
        let mut clock = FakeClock::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            status(&mut fleet, &targets(&["A"]), None).expect("status")
        };
        assert_eq!(output.value.rows[0].state, MachineState::Halted);
        assert!(output.events.iter().any(|event| matches!(
            event,
            Event::Message {
                severity: Severity::Warning,
                ..
            }
        )));
    }

    #[test]
    fn status_reports_each_target() {
        let mut tool = FakeHypervisor::new(&["A", "B"]);
        tool.running = vec!["B".into()];
        let mut clock = FakeClock::new();
        let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
        let output = status(&mut fleet, &targets(&["A", "B"]), None).expect("status");
        assert_eq!(
            output.value.rows,
            vec![
                VmStatusRow {
                    name: "A".into(),
                    state: MachineState::Halted,
                },
                VmStatusRow {
                    name: "B".into(),
                    state: MachineState::Running,
                },
            ]
        );
    }

    #[test]
    fn delegate_reporter_sees_events_live() {
        let mut tool = FakeHypervisor::new(&["A"]);
        let mut clock = FakeClock::new();
        let mut seen: Vec<Event> = Vec::new();
        let output = {
            let mut fleet = Fleet::new(&mut tool, &mut clock, Timing::default());
            start(
                &mut fleet,
                &targets(&["A"]),
                StartOptions {
                    delay: StartDelay::None,
                },
                Some(&mut seen),
            )
            .expect("start")
        };
        assert!(output.events.is_empty());
        assert!(seen.contains(&Event::ActionAttempted {
            vm: "A".into(),
            action: ActionKind::Start,
        }));
    }

    #[test]
    fn clone_name_uses_minute_resolution() {
        let at = time::macros::datetime!(2023-12-31 23:59:58 UTC);
        let name = clone_name("web", at);
        assert_eq!(name, "web_2023-12-31_23-59");
        let shape = regex::Regex::new(r"^web_\d{4}-\d{2}-\d{2}_\d{2}-\d{2}$").expect("regex");
        assert!(shape.is_match(&name));
    }
}
