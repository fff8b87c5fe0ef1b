use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::core::clock::Clock;
use crate::core::invoker::{ControlTool, Invocation, PowerAction, ToolCommand};

/// Scripted stand-in for `vboxmanage`.
#[derive(Debug, Default)]
pub struct FakeHypervisor {
    pub registered: Vec<String>,
    pub running: Vec<String>,
    pub log: Vec<ToolCommand>,
    /// Running-set queries a stopped machine keeps showing up in.
    pub halt_after_polls: u32,
    /// Accept stop commands without ever halting.
    pub ignore_stops: bool,
    pub fail_listing: bool,
    pub fail_running_query: bool,
    failing_starts: HashSet<String>,
    failing_stops: HashSet<String>,
    stopping: HashMap<String, u32>,
}

impl FakeHypervisor {
    pub fn new(registered: &[&str]) -> Self {
        Self {
            registered: registered.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn fail_start(&mut self, name: &str) {
        self.failing_starts.insert(name.to_string());
    }

    pub fn fail_stop(&mut self, name: &str) {
        self.failing_stops.insert(name.to_string());
    }

    fn listing(names: &[String]) -> String {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| format!("\"{name}\" {{00000000-0000-0000-0000-{index:012}}}"))
            .collect::<Vec<_>>()
            .join("\r\n")
    }

    fn advance_stopping(&mut self) {
        let mut halted = Vec::new();
        for (name, polls) in self.stopping.iter_mut() {
            *polls = polls.saturating_sub(1);
            if *polls == 0 {
                halted.push(name.clone());
            }
        }
        for name in halted {
            self.stopping.remove(&name);
            self.running.retain(|vm| *vm != name);
        }
    }
}

impl ControlTool for FakeHypervisor {
    fn invoke(&mut self, command: &ToolCommand) -> Invocation {
        self.log.push(command.clone());
        match command {
            ToolCommand::ListVms => {
                if self.fail_listing {
                    Invocation::failure("VBoxManage: error: listing failed")
                } else {
                    Invocation::success(Self::listing(&self.registered))
                }
            }
            ToolCommand::ListRunningVms => {
                if self.fail_running_query {
                    return Invocation::failure("VBoxManage: error: listing failed");
                }
                self.advance_stopping();
                Invocation::success(Self::listing(&self.running))
            }
            ToolCommand::StartVm { name } => {
                if self.failing_starts.contains(name) {
                    return Invocation::failure(format!(
                        "VBoxManage: error: could not start {name}"
                    ));
                }
                if !self.running.contains(name) {
                    self.running.push(name.clone());
                }
                Invocation::success(format!("VM \"{name}\" has been successfully started."))
            }
            ToolCommand::ControlVm { name, action } => {
                if !self.running.contains(name) {
                    return Invocation::failure(format!(
                        "Machine '{name}' is not currently running"
                    ));
                }
                if self.failing_stops.contains(name) && *action != PowerAction::Reset {
                    return Invocation::failure(format!(
                        "VBoxManage: error: could not power down {name}"
                    ));
                }
                match action {
                    PowerAction::Reset => {}
                    PowerAction::AcpiPowerButton | PowerAction::PowerOff => {
                        if !self.ignore_stops {
                            self.stopping
                                .entry(name.clone())
                                .or_insert(self.halt_after_polls);
                        }
                    }
                }
                Invocation::success("")
            }
            ToolCommand::CloneVm {
                clone_name,
                register,
                ..
            } => {
                if *register {
                    self.registered.push(clone_name.clone());
                }
                Invocation::success(format!(
                    "0%...10%...20%...100%\r\n\
                     Machine has been successfully cloned as \"{clone_name}\""
                ))
            }
        }
    }
}

/// Virtual clock: sleeping only advances time.
#[derive(Debug)]
pub struct FakeClock {
    origin: Instant,
    elapsed: Duration,
    pub sleeps: Vec<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Duration::ZERO,
            sleeps: Vec::new(),
        }
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed
    }

    fn sleep(&mut self, duration: Duration) {
        self.elapsed += duration;
        self.sleeps.push(duration);
    }

    fn wall_clock(&self) -> OffsetDateTime {
        time::macros::datetime!(2024-03-05 14:07:33 UTC)
    }
}

/// Commands whose first argument is `verb`.
pub fn commands_of_kind(log: &[ToolCommand], verb: &str) -> Vec<ToolCommand> {
    log.iter()
        .filter(|command| command.args().first().map(String::as_str) == Some(verb))
        .cloned()
        .collect()
}
