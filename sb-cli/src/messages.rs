//! User-facing message formatting
//!
//! Success and error messages with follow-up hints the user can copy.

use sb_model::{BoardSelection, BuildOutcome, SessionStatus};

/// Print success message with next steps
pub fn print_success(message: &str, next_steps: &[&str]) {
    println!("✓ {message}");
    if !next_steps.is_empty() {
        println!("\nNext steps:");
        for step in next_steps {
            println!("  {step}");
        }
    }
}

/// Print error message with suggestions
pub fn print_error(message: &str, suggestions: &[&str]) {
    eprintln!("✗ {message}");
    if !suggestions.is_empty() {
        eprintln!();
        for suggestion in suggestions {
            eprintln!("  {suggestion}");
        }
    }
}

/// One-line summary of a session status
pub fn format_status(status: &SessionStatus) -> String {
    let board = match &status.board {
        BoardSelection::Unselected => "no board selected".to_string(),
        BoardSelection::Selected(info) => format!("{} ({})", info.id, info.fqbn),
    };
    let port = status.serial.port.as_deref().unwrap_or("no port");
    let state = if status.connected { "open" } else { "closed" };
    format!("{board}, serial {port} @ {} baud ({state})", status.serial.baud)
}

/// Build log followed by a verdict line
pub fn format_build(action: &str, outcome: &BuildOutcome) -> String {
    let verdict = if outcome.success {
        format!("✓ {action} succeeded")
    } else {
        format!("✗ {action} failed")
    };
    if outcome.log.is_empty() {
        verdict
    } else {
        format!("{}\n{verdict}", outcome.log)
    }
}
