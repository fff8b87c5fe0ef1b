use crate::Result;
use crate::core::events::Operation;
use crate::core::operations;
use crate::core::options::EffectiveOptions;

use super::common::{log_parameters, summarize, with_fleet};

pub fn handle_start(options: &EffectiveOptions) -> Result<()> {
    log_parameters(Operation::Start, options);
    let outcome = with_fleet(options, |fleet, targets, reporter| {
        operations::start(fleet, targets, options.start_options(), Some(reporter))
    })?;
    summarize(&outcome.value);
    Ok(())
}

pub fn handle_stop(options: &EffectiveOptions) -> Result<()> {
    log_parameters(Operation::Stop, options);
    let outcome = with_fleet(options, |fleet, targets, reporter| {
        operations::stop(fleet, targets, options.stop_options(), Some(reporter))
    })?;
    summarize(&outcome.value);
    Ok(())
}

pub fn handle_restart(options: &EffectiveOptions) -> Result<()> {
    log_parameters(Operation::Restart, options);
    let outcome = with_fleet(options, |fleet, targets, reporter| {
        operations::restart(fleet, targets, options.restart_options(), Some(reporter))
    })?;
    summarize(&outcome.value);
    Ok(())
}

pub fn handle_clone(options: &EffectiveOptions) -> Result<()> {
    log_parameters(Operation::Clone, options);
    let outcome = with_fleet(options, |fleet, targets, reporter| {
        operations::clone(fleet, targets, options.clone_options(), Some(reporter))
    })?;
    summarize(&outcome.value);
    Ok(())
}
