//! The executor capability: run relay commands somewhere
//!
//! Callers choose an implementation once, local or remote, and then issue
//! commands without caring where the hardware is.

use std::time::Duration;

use sb_model::{BoardInfo, BuildOutcome, Operation, RelayCommand, RelayError, RelayResult, SessionStatus};

pub trait Executor {
    /// Run one command and return its result
    fn execute(&mut self, command: RelayCommand) -> Result<RelayResult, RelayError>;

    fn select_board(&mut self, board: &str) -> Result<SessionStatus, RelayError> {
        let result = self.execute(RelayCommand::SelectBoard {
            board: board.to_string(),
        })?;
        expect_status(Operation::SelectBoard, result)
    }

    fn configure_serial(&mut self, port: Option<&str>, baud: Option<u32>) -> Result<SessionStatus, RelayError> {
        let result = self.execute(RelayCommand::ConfigureSerial {
            port: port.map(str::to_string),
            baud,
        })?;
        expect_status(Operation::ConfigureSerial, result)
    }

    fn compile(&mut self, source: &str, extra_args: &[String]) -> Result<BuildOutcome, RelayError> {
        let result = self.execute(RelayCommand::Compile {
            source: source.to_string(),
            extra_args: extra_args.to_vec(),
        })?;
        expect_build(Operation::Compile, result)
    }

    fn upload(&mut self, source: &str, extra_args: &[String]) -> Result<BuildOutcome, RelayError> {
        let result = self.execute(RelayCommand::Upload {
            source: source.to_string(),
            extra_args: extra_args.to_vec(),
        })?;
        expect_build(Operation::Upload, result)
    }

    fn listen(&mut self, duration: Duration, prefix: Option<&str>) -> Result<Vec<String>, RelayError> {
        let result = self.execute(RelayCommand::Listen {
            duration_secs: duration.as_secs_f64(),
            prefix: prefix.map(str::to_string),
        })?;
        expect_lines(Operation::Listen, result)
    }

    fn read(&mut self, max_lines: usize) -> Result<Vec<String>, RelayError> {
        let result = self.execute(RelayCommand::Read { max_lines })?;
        expect_lines(Operation::Read, result)
    }

    fn write(&mut self, text: &str, append_newline: bool) -> Result<usize, RelayError> {
        match self.execute(RelayCommand::Write {
            text: text.to_string(),
            append_newline,
        })? {
            RelayResult::Written { bytes } => Ok(bytes),
            other => Err(unexpected(Operation::Write, &other)),
        }
    }

    fn status(&mut self) -> Result<SessionStatus, RelayError> {
        let result = self.execute(RelayCommand::Status)?;
        expect_status(Operation::Status, result)
    }

    fn open(&mut self) -> Result<SessionStatus, RelayError> {
        let result = self.execute(RelayCommand::Open)?;
        expect_status(Operation::Open, result)
    }

    fn close(&mut self) -> Result<(), RelayError> {
        self.execute(RelayCommand::Close).map(|_| ())
    }

    fn list_boards(&mut self) -> Result<Vec<BoardInfo>, RelayError> {
        match self.execute(RelayCommand::ListBoards)? {
            RelayResult::Boards { boards } => Ok(boards),
            other => Err(unexpected(Operation::ListBoards, &other)),
        }
    }

    fn list_ports(&mut self) -> Result<Vec<String>, RelayError> {
        match self.execute(RelayCommand::ListPorts)? {
            RelayResult::Ports { ports } => Ok(ports),
            other => Err(unexpected(Operation::ListPorts, &other)),
        }
    }
}

fn unexpected(op: Operation, result: &RelayResult) -> RelayError {
    RelayError::malformed(format!("Unexpected result for {op}: {result:?}"))
}

fn expect_status(op: Operation, result: RelayResult) -> Result<SessionStatus, RelayError> {
    match result {
        RelayResult::Status(status) => Ok(status),
        other => Err(unexpected(op, &other)),
    }
}

fn expect_build(op: Operation, result: RelayResult) -> Result<BuildOutcome, RelayError> {
    match result {
        RelayResult::Build(outcome) => Ok(outcome),
        other => Err(unexpected(op, &other)),
    }
}

fn expect_lines(op: Operation, result: RelayResult) -> Result<Vec<String>, RelayError> {
    match result {
        RelayResult::Lines { lines } => Ok(lines),
        other => Err(unexpected(op, &other)),
    }
}
