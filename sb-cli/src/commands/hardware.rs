//! `sb boards` and `sb ports`

use anyhow::Result;

use super::target::TargetArgs;

pub fn handle_boards(target: &TargetArgs) -> Result<()> {
    let mut executor = target.executor()?;
    for board in executor.list_boards()? {
        println!("{:<6} {:<18} {} baud", board.id.name(), board.fqbn, board.default_baud);
    }
    Ok(())
}

pub fn handle_ports(target: &TargetArgs) -> Result<()> {
    let mut executor = target.executor()?;
    let ports = executor.list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}
