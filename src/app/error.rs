use std::process::ExitCode;

use crate::Error;

/// Exit status for fatal configuration and resolution errors.
pub const FATAL_EXIT: u8 = 2;

pub fn exit_code(err: &Error) -> ExitCode {
    match err {
        Error::ExplicitConfigMissing { .. }
        | Error::ReadConfig { .. }
        | Error::ParseYamlConfig { .. }
        | Error::ParseTomlConfig { .. }
        | Error::InvalidOption { .. }
        | Error::ReadVmFile { .. }
        | Error::DiscoveryFailed { .. }
        | Error::OpenLogFile { .. } => ExitCode::from(FATAL_EXIT),
    }
}
