pub mod common;
pub mod error;
pub mod lifecycle;
pub mod status;

use std::path::PathBuf;
use std::process::ExitCode;

use crate::Result;
use crate::cli::{Commands, GlobalArgs};
use crate::core::options::{DEFAULT_LOG_FILE, EffectiveOptions};
use crate::logging::{LogContext, LogSettings};

pub use lifecycle::{handle_clone, handle_restart, handle_start, handle_stop};
pub use status::handle_status;

/// Resolve options, install logging, and dispatch one subcommand.
pub fn run(global: &GlobalArgs, command: Commands) -> ExitCode {
    let cli_layer = common::command_layer(global, &command);
    let resolved = common::resolve_options(global, cli_layer);

    // Logging has to be up before a resolution error can be reported.
    let _logging = match LogContext::init(&log_settings(&resolved, global)) {
        Ok(context) => context,
        Err(err) => {
            eprintln!("Error: {err}");
            return error::exit_code(&err);
        }
    };

    let options = match resolved {
        Ok(options) => options,
        Err(err) => {
            tracing::error!("{err}");
            return error::exit_code(&err);
        }
    };

    let result = match command {
        Commands::Start(_) => handle_start(&options),
        Commands::Stop(_) => handle_stop(&options),
        Commands::Restart(_) => handle_restart(&options),
        Commands::Clone(_) => handle_clone(&options),
        Commands::Status(_) => handle_status(&options),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            error::exit_code(&err)
        }
    }
}

/// Log settings from the resolved options, or from the command line alone when
/// resolution failed.
fn log_settings(resolved: &Result<EffectiveOptions>, global: &GlobalArgs) -> LogSettings {
    match resolved {
        Ok(options) => LogSettings {
            debug: options.debug,
            file: Some(options.log_file.clone()),
        },
        Err(_) => LogSettings {
            debug: global.debug,
            file: Some(
                global
                    .log_file
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            ),
        },
    }
}
