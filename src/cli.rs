use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI definition for the `vboxfleet` tool.
#[derive(Debug, Parser)]
#[command(
    name = "vboxfleet",
    version,
    about = "Start, stop, restart and clone groups of VirtualBox machines.",
    long_about = "vboxfleet drives `vboxmanage` against a list of machines taken from --vmlist, \
                  --vmfile, or every registered VM.\nSettings are read from settings.yml in the \
                  working directory unless --config points elsewhere."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalArgs {
    /// Log debug output to the console.
    #[arg(global = true, long)]
    pub debug: bool,

    /// Comma separated list of VMs (default is all registered VMs).
    #[arg(global = true, long, value_name = "LIST")]
    pub vmlist: Option<String>,

    /// File listing one VM name per line; `#` starts a comment line.
    #[arg(global = true, long, value_name = "PATH")]
    pub vmfile: Option<PathBuf>,

    /// Settings file to load instead of ./settings.yml.
    #[arg(
        global = true,
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Load settings from PATH (YAML, or TOML when the name ends in .toml). \
                Missing ./settings.yml is ignored; a missing PATH is fatal."
    )]
    pub config: Option<PathBuf>,

    /// Path to the vboxmanage executable.
    #[arg(global = true, long, value_name = "PATH", env = "VBOXMANAGE")]
    pub vboxmanage: Option<PathBuf>,

    /// Append log output to PATH (default ./vboxfleet.log).
    #[arg(global = true, long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Boot halted VMs headless, optionally pausing between boots.
    Start(StartArgs),
    /// Shut down running VMs and wait until they are halted.
    Stop(StopArgs),
    /// Stop and start running VMs again, or hard-reset them with --force.
    Restart(RestartArgs),
    /// Stop VMs, clone each one with a timestamp suffix, and optionally start them again.
    Clone(CloneArgs),
    /// Show whether each VM is running or halted.
    Status(StatusArgs),
}

#[derive(Debug, Args, Default)]
pub struct StartArgs {
    /// Minutes to wait between VM startups (-1 disables the wait).
    #[arg(long, value_name = "MINUTES", allow_negative_numbers = true)]
    pub start_delay: Option<i64>,
}

#[derive(Debug, Args, Default)]
pub struct StopArgs {
    /// Power off immediately instead of pressing the ACPI power button.
    #[arg(long, help = "How to power down the VM: hard (force) or normal (ACPI)")]
    pub force: bool,

    /// Minutes to wait for the VMs to halt (0 waits forever).
    #[arg(long, value_name = "MINUTES", allow_negative_numbers = true)]
    pub max_wait_time: Option<f64>,
}

#[derive(Debug, Args, Default)]
pub struct RestartArgs {
    /// Hard-reset the VMs instead of stopping and starting them.
    #[arg(long)]
    pub force: bool,

    /// Restart continues after this many minutes even if some VMs did not shut down
    /// (0 waits forever).
    #[arg(long, value_name = "MINUTES", allow_negative_numbers = true)]
    pub max_wait_time: Option<f64>,
}

#[derive(Debug, Args, Default)]
pub struct CloneArgs {
    /// Power off immediately instead of pressing the ACPI power button.
    #[arg(long)]
    pub force: bool,

    /// Register the clones with VirtualBox (default).
    #[arg(long, conflicts_with = "no_add")]
    pub add: bool,

    /// Do not register the clones.
    #[arg(long)]
    pub no_add: bool,

    /// Start the original VMs after cloning (default).
    #[arg(long, conflicts_with = "no_restart")]
    pub restart: bool,

    /// Leave the original VMs halted after cloning.
    #[arg(long)]
    pub no_restart: bool,

    /// Minutes to wait for the VMs to halt before cloning (0 waits forever).
    #[arg(long, value_name = "MINUTES", allow_negative_numbers = true)]
    pub max_wait_time: Option<f64>,

    /// Minutes to wait between VM startups after cloning.
    #[arg(long, value_name = "MINUTES", allow_negative_numbers = true)]
    pub start_delay: Option<i64>,
}

#[derive(Debug, Args, Default)]
pub struct StatusArgs {}
