use clap::{Parser, Subcommand};
use env_logger::Env;

use sb_cli::commands::console::{ConsoleArgs, handle_console};
use sb_cli::commands::hardware::{handle_boards, handle_ports};
use sb_cli::commands::serve::{ServeArgs, handle_serve};
use sb_cli::commands::TargetArgs;
use sb_cli::messages::print_error;

#[derive(Parser)]
#[command(name = "sb")]
#[command(about = "SketchBridge - compose Arduino sketches and drive boards, locally or through a relay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the board attached to this machine to remote clients
    Serve(ServeArgs),
    /// Interactive or scripted sketch console
    Console(ConsoleArgs),
    /// List supported boards
    Boards(TargetArgs),
    /// List serial ports on the hardware host
    Ports(TargetArgs),
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args),
        Commands::Console(args) => handle_console(args),
        Commands::Boards(target) => handle_boards(&target),
        Commands::Ports(target) => handle_ports(&target),
    };

    if let Err(e) = result {
        print_error(&format!("{e:#}"), &[]);
        std::process::exit(1);
    }
}
