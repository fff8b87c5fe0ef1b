use std::io::{self, IsTerminal};

use crate::Result;
use crate::core::operations;
use crate::core::options::EffectiveOptions;
use crate::core::outcome::VmStatusRow;
use crate::core::state::MachineState;

use super::common::with_fleet;

pub fn handle_status(options: &EffectiveOptions) -> Result<()> {
    let output = with_fleet(options, |fleet, targets, reporter| {
        operations::status(fleet, targets, Some(reporter))
    })?;
    print_status_table(&output.value.rows);
    Ok(())
}

pub fn print_status_table(rows: &[VmStatusRow]) {
    if rows.is_empty() {
        println!("No VMs found.");
        return;
    }

    let name_width = rows
        .iter()
        .map(|row| row.name.len())
        .max()
        .unwrap_or(0)
        .max("VM".len());
    let colored = io::stdout().is_terminal();

    println!("{:<name_width$}  STATE", "VM");
    for row in rows {
        println!("{:<name_width$}  {}", row.name, render_state(row.state, colored));
    }

    let running = rows
        .iter()
        .filter(|row| row.state == MachineState::Running)
        .count();
    println!();
    println!("{running} of {} running", rows.len());
}

fn render_state(state: MachineState, colored: bool) -> String {
    if !colored {
        return state.to_string();
    }
    let code = match state {
        MachineState::Running => "32",
        MachineState::Halted => "33",
    };
    format!("\x1b[{code}m{state}\x1b[0m")
}
