use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, Result};

use super::invoker::{DEFAULT_VBOXMANAGE, PowerAction};
use super::targets::TargetSource;

/// Default log file, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "vboxfleet.log";

/// One layer of option values. `None` means "not supplied by this layer".
///
/// Layers are merged per key: the command line wins over the settings file,
/// which wins over the defaults. A layer can supply an explicit `false` or
/// `0`, which the merge honors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionLayer {
    pub start_delay: Option<i64>,
    pub force: Option<bool>,
    pub max_wait_time: Option<f64>,
    pub add: Option<bool>,
    pub restart: Option<bool>,
    pub vmlist: Option<String>,
    pub vmfile: Option<PathBuf>,
    pub debug: Option<bool>,
    pub vboxmanage: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub settle_delay_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub retry_every: Option<u32>,
    pub delay_unit_secs: Option<u64>,
}

impl OptionLayer {
    /// Overlay `self` on top of `lower`: any key present here wins.
    pub fn over(self, lower: OptionLayer) -> OptionLayer {
        OptionLayer {
            start_delay: self.start_delay.or(lower.start_delay),
            force: self.force.or(lower.force),
            max_wait_time: self.max_wait_time.or(lower.max_wait_time),
            add: self.add.or(lower.add),
            restart: self.restart.or(lower.restart),
            vmlist: non_empty(self.vmlist).or(non_empty(lower.vmlist)),
            vmfile: self.vmfile.or(lower.vmfile),
            debug: self.debug.or(lower.debug),
            vboxmanage: self.vboxmanage.or(lower.vboxmanage),
            log_file: self.log_file.or(lower.log_file),
            settle_delay_secs: self.settle_delay_secs.or(lower.settle_delay_secs),
            poll_interval_secs: self.poll_interval_secs.or(lower.poll_interval_secs),
            retry_every: self.retry_every.or(lower.retry_every),
            delay_unit_secs: self.delay_unit_secs.or(lower.delay_unit_secs),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Fully resolved option set for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveOptions {
    /// Minutes between successive starts; negative disables the delay.
    pub start_delay: i64,
    pub force: bool,
    /// Minutes to wait for halt confirmation; 0 waits forever, negative skips.
    pub max_wait_time: f64,
    /// Register clones with the hypervisor.
    pub add: bool,
    /// Start the originals again after cloning.
    pub restart: bool,
    pub vmlist: Option<String>,
    pub vmfile: Option<PathBuf>,
    pub debug: bool,
    pub vboxmanage: PathBuf,
    pub log_file: PathBuf,
    pub timing: Timing,
}

impl Default for EffectiveOptions {
    fn default() -> Self {
        Self {
            start_delay: -1,
            force: false,
            max_wait_time: 1.0,
            add: true,
            restart: true,
            vmlist: None,
            vmfile: None,
            debug: false,
            vboxmanage: PathBuf::from(DEFAULT_VBOXMANAGE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            timing: Timing::default(),
        }
    }
}

impl EffectiveOptions {
    /// Merge the command-line layer over the file layer over the defaults.
    pub fn resolve(file: OptionLayer, cli: OptionLayer) -> Result<Self> {
        let merged = cli.over(file);
        let defaults = Self::default();

        let max_wait_time = merged.max_wait_time.unwrap_or(defaults.max_wait_time);
        if !max_wait_time.is_finite() {
            return Err(Error::InvalidOption {
                key: "max_wait_time",
                message: format!("expected a finite number of minutes, got {max_wait_time}"),
            });
        }

        let retry_every = merged.retry_every.unwrap_or(defaults.timing.retry_every);
        if retry_every == 0 {
            return Err(Error::InvalidOption {
                key: "retry_every",
                message: "must be at least 1".into(),
            });
        }

        let timing = Timing {
            settle_delay: merged
                .settle_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timing.settle_delay),
            poll_interval: merged
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timing.poll_interval),
            retry_every,
            delay_unit: merged
                .delay_unit_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timing.delay_unit),
        };

        Ok(Self {
            start_delay: merged.start_delay.unwrap_or(defaults.start_delay),
            force: merged.force.unwrap_or(defaults.force),
            max_wait_time,
            add: merged.add.unwrap_or(defaults.add),
            restart: merged.restart.unwrap_or(defaults.restart),
            vmlist: merged.vmlist,
            vmfile: merged.vmfile,
            debug: merged.debug.unwrap_or(defaults.debug),
            vboxmanage: merged.vboxmanage.unwrap_or(defaults.vboxmanage),
            log_file: merged.log_file.unwrap_or(defaults.log_file),
            timing,
        })
    }

    pub fn target_source(&self) -> TargetSource {
        TargetSource {
            vmlist: self.vmlist.clone(),
            vmfile: self.vmfile.clone(),
        }
    }

    pub fn start_options(&self) -> StartOptions {
        StartOptions {
            delay: StartDelay::from_minutes(self.start_delay),
        }
    }

    pub fn stop_options(&self) -> StopOptions {
        StopOptions {
            method: PowerAction::stop(self.force),
            wait: HaltWait::from_minutes(self.max_wait_time),
        }
    }

    pub fn restart_options(&self) -> RestartOptions {
        RestartOptions {
            force: self.force,
            wait: HaltWait::from_minutes(self.max_wait_time),
        }
    }

    pub fn clone_options(&self) -> CloneOptions {
        CloneOptions {
            stop: self.stop_options(),
            register: self.add,
            restart: self.restart,
            delay: StartDelay::from_minutes(self.start_delay),
        }
    }
}

/// Polling and delay constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timing {
    /// Pause before the first halt-confirmation poll.
    pub settle_delay: Duration,
    /// Pause between halt-confirmation polls.
    pub poll_interval: Duration,
    /// Re-issue the stop command every this many polling cycles.
    pub retry_every: u32,
    /// Length of one unit of `start_delay` (one minute).
    pub delay_unit: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
            retry_every: 5,
            delay_unit: Duration::from_secs(60),
        }
    }
}

/// Bound on halt confirmation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HaltWait {
    /// Do not confirm at all.
    Skip,
    /// Poll until every target is halted.
    Unbounded,
    /// Give up once this much time has elapsed.
    Bounded(Duration),
}

impl HaltWait {
    pub fn from_minutes(minutes: f64) -> Self {
        if minutes < 0.0 {
            HaltWait::Skip
        } else if minutes == 0.0 {
            HaltWait::Unbounded
        } else {
            // A bound too large for `Duration` never elapses anyway.
            Duration::try_from_secs_f64(minutes * 60.0)
                .map(HaltWait::Bounded)
                .unwrap_or(HaltWait::Unbounded)
        }
    }
}

/// Pause inserted between successive successful starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDelay {
    None,
    Minutes(u64),
}

impl StartDelay {
    pub fn from_minutes(minutes: i64) -> Self {
        match u64::try_from(minutes) {
            Ok(minutes) => StartDelay::Minutes(minutes),
            Err(_) => StartDelay::None,
        }
    }
}

/// Options for the `start` operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartOptions {
    pub delay: StartDelay,
}

/// Options for the `stop` operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopOptions {
    pub method: PowerAction,
    pub wait: HaltWait,
}

/// Options for the `restart` operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartOptions {
    /// Hard reset instead of stop-then-start.
    pub force: bool,
    pub wait: HaltWait,
}

/// Options for the `clone` operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloneOptions {
    pub stop: StopOptions,
    pub register: bool,
    pub restart: bool,
    pub delay: StartDelay,
}
