use std::fmt;
use std::path::PathBuf;
use std::process::Command;

/// Default executable name of the hypervisor control tool.
pub const DEFAULT_VBOXMANAGE: &str = "vboxmanage";

/// How `controlvm` should act on a running machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    /// ACPI power button; lets the guest shut down cleanly.
    AcpiPowerButton,
    /// Immediate power-off.
    PowerOff,
    /// Hard reset.
    Reset,
}

impl PowerAction {
    /// Stop method selected by the `force` option.
    pub fn stop(force: bool) -> Self {
        if force {
            PowerAction::PowerOff
        } else {
            PowerAction::AcpiPowerButton
        }
    }

    pub fn as_arg(self) -> &'static str {
        match self {
            PowerAction::AcpiPowerButton => "acpipowerbutton",
            PowerAction::PowerOff => "poweroff",
            PowerAction::Reset => "reset",
        }
    }
}

/// The command shapes the engine issues against the control tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    ListVms,
    ListRunningVms,
    StartVm {
        name: String,
    },
    ControlVm {
        name: String,
        action: PowerAction,
    },
    CloneVm {
        name: String,
        clone_name: String,
        register: bool,
    },
}

impl ToolCommand {
    /// Arguments passed to the tool, excluding the executable itself.
    pub fn args(&self) -> Vec<String> {
        match self {
            ToolCommand::ListVms => vec!["list".into(), "vms".into()],
            ToolCommand::ListRunningVms => vec!["list".into(), "runningvms".into()],
            ToolCommand::StartVm { name } => vec![
                "startvm".into(),
                name.clone(),
                "--type".into(),
                "headless".into(),
            ],
            ToolCommand::ControlVm { name, action } => {
                vec!["controlvm".into(), name.clone(), action.as_arg().into()]
            }
            ToolCommand::CloneVm {
                name,
                clone_name,
                register,
            } => {
                let mut args = vec![
                    "clonevm".into(),
                    name.clone(),
                    "--name".into(),
                    clone_name.clone(),
                ];
                if *register {
                    args.push("--register".into());
                }
                args
            }
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .args()
            .into_iter()
            .map(|arg| {
                if arg.contains(char::is_whitespace) {
                    format!("\"{arg}\"")
                } else {
                    arg
                }
            })
            .collect();
        write!(f, "{DEFAULT_VBOXMANAGE} {}", rendered.join(" "))
    }
}

/// Result of one synchronous tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Normalized stdout on success, error text on failure.
    pub output: String,
    pub ok: bool,
}

impl Invocation {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: normalize_output(&output.into()),
            ok: true,
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            output: normalize_output(&output.into()),
            ok: false,
        }
    }
}

/// Trim surrounding whitespace and fold CRLF line endings into `\n`.
pub fn normalize_output(raw: &str) -> String {
    raw.trim().replace("\r\n", "\n")
}

/// Executes control-tool commands. Implementations never fail: a failed
/// command is an `Invocation` with `ok == false`.
pub trait ControlTool {
    fn invoke(&mut self, command: &ToolCommand) -> Invocation;
}

/// Runs the real `vboxmanage` executable, one process per command.
#[derive(Debug, Clone)]
pub struct VBoxManage {
    program: PathBuf,
}

impl VBoxManage {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for VBoxManage {
    fn default() -> Self {
        Self::new(DEFAULT_VBOXMANAGE)
    }
}

impl ControlTool for VBoxManage {
    fn invoke(&mut self, command: &ToolCommand) -> Invocation {
        let output = match Command::new(&self.program).args(command.args()).output() {
            Ok(output) => output,
            Err(err) => {
                return Invocation::failure(format!(
                    "Failed to execute {}: {err}",
                    self.program.display()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            return Invocation::success(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr
        };
        let status = match output.status.code() {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        };
        Invocation::failure(format!("Command `{command}` failed ({status}): {detail}"))
    }
}
