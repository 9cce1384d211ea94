//! Session state and command dispatch
//!
//! A [`Session`] owns the board selection, the serial connection and the
//! toolchain. [`dispatch`] is the single entry point used both for local
//! execution and by the relay server, so the two paths behave the same.

use std::time::Duration;

use sb_model::relay::MAX_LISTEN_SECS;
use sb_model::{BoardSession, RelayCommand, RelayError, RelayResult, SessionStatus};

use crate::serial::{SerialBridge, SerialError};
use crate::toolchain::ToolchainGateway;

pub struct Session {
    board: BoardSession,
    serial: SerialBridge,
    toolchain: ToolchainGateway,
}

impl Session {
    pub fn new(serial: SerialBridge, toolchain: ToolchainGateway) -> Self {
        Self {
            board: BoardSession::new(),
            serial,
            toolchain,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            board: self.board.selection(),
            serial: self.board.serial().clone(),
            connected: self.serial.is_open(),
        }
    }

    /// Open the configured port unless it is already open
    fn ensure_open(&mut self) -> Result<(), SerialError> {
        let config = self.board.serial();
        let port = config.port.clone().ok_or(SerialError::NoPortConfigured)?;
        let baud = config.baud;
        self.serial.open(&port, baud)
    }
}

fn listen_window(duration_secs: f64) -> Result<Duration, RelayError> {
    if !duration_secs.is_finite() || !(0.0..=MAX_LISTEN_SECS).contains(&duration_secs) {
        return Err(RelayError::invalid_argument(format!(
            "Listen duration must be between 0 and {MAX_LISTEN_SECS} seconds, got {duration_secs}"
        )));
    }
    Ok(Duration::from_secs_f64(duration_secs))
}

/// Run one command against the session
pub fn dispatch(session: &mut Session, command: RelayCommand) -> Result<RelayResult, RelayError> {
    log::debug!("Dispatching {}", command.op());
    match command {
        RelayCommand::SelectBoard { board } => {
            session.board.select(&board)?;
            Ok(RelayResult::Status(session.status()))
        }
        RelayCommand::ConfigureSerial { port, baud } => {
            let config = session.board.configure_serial(port.as_deref(), baud)?.clone();
            // An open connection with stale settings is reopened on next use
            let stale = session
                .serial
                .connection()
                .is_some_and(|(p, b)| (Some(p), b) != (config.port.as_deref(), config.baud));
            if stale {
                session.serial.close();
            }
            Ok(RelayResult::Status(session.status()))
        }
        RelayCommand::Compile { source, extra_args } => {
            let board = session.board.require_board()?;
            let outcome = session.toolchain.compile(&source, board, &extra_args)?;
            Ok(RelayResult::Build(outcome))
        }
        RelayCommand::Upload { source, extra_args } => {
            let board = session.board.require_board()?;
            let port = session.board.serial().port.clone();
            if port.is_some() {
                // The uploader needs exclusive use of the port
                session.serial.close();
            }
            let outcome = session
                .toolchain
                .upload(&source, board, port.as_deref(), &extra_args)?;
            Ok(RelayResult::Build(outcome))
        }
        RelayCommand::Listen {
            duration_secs,
            prefix,
        } => {
            let window = listen_window(duration_secs)?;
            session.ensure_open()?;
            let lines = session.serial.listen(window, prefix.as_deref())?;
            Ok(RelayResult::Lines { lines })
        }
        RelayCommand::Read { max_lines } => {
            session.ensure_open()?;
            let lines = session.serial.read(max_lines)?;
            Ok(RelayResult::Lines { lines })
        }
        RelayCommand::Write {
            text,
            append_newline,
        } => {
            session.ensure_open()?;
            let bytes = session.serial.write(&text, append_newline)?;
            Ok(RelayResult::Written { bytes })
        }
        RelayCommand::Status => Ok(RelayResult::Status(session.status())),
        RelayCommand::Open => {
            session.ensure_open()?;
            Ok(RelayResult::Status(session.status()))
        }
        RelayCommand::Close => {
            session.serial.close();
            Ok(RelayResult::Ack)
        }
        RelayCommand::ListBoards => Ok(RelayResult::Boards {
            boards: BoardSession::list_boards(),
        }),
        RelayCommand::ListPorts => {
            let ports = session.serial.available_ports()?;
            Ok(RelayResult::Ports { ports })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::{FakeSerial, FakeSerialHandle};
    use crate::toolchain::RecordingRunner;
    use sb_model::{BoardSelection, ErrorKind, Section, Sketch};

    fn session() -> (Session, FakeSerialHandle, RecordingRunner) {
        let fake = FakeSerial::new(["COM5", "COM6"]).with_line(Duration::from_millis(100), "ready");
        let handle = fake.handle();
        let runner = RecordingRunner::new();
        let session = Session::new(
            SerialBridge::new(Box::new(fake)).with_read_timeout(Duration::from_millis(300)),
            ToolchainGateway::new(Box::new(runner.clone())).with_program("arduino-cli"),
        );
        (session, handle, runner)
    }

    fn run(session: &mut Session, command: RelayCommand) -> Result<RelayResult, RelayError> {
        dispatch(session, command)
    }

    #[test]
    fn test_led_example_upload() {
        let (mut session, serial, runner) = session();
        let mut sketch = Sketch::new();
        sketch.set(Section::Globals, "int led=13;", true);
        sketch.set(Section::Setup, "pinMode(led,OUTPUT);", true);
        sketch.set(Section::Loop, "digitalWrite(led,HIGH);", true);

        run(&mut session, RelayCommand::SelectBoard { board: "uno".into() }).unwrap();
        run(
            &mut session,
            RelayCommand::ConfigureSerial {
                port: Some("COM5".into()),
                baud: None,
            },
        )
        .unwrap();
        run(&mut session, RelayCommand::Open).unwrap();
        assert!(serial.is_open());

        let result = run(
            &mut session,
            RelayCommand::Upload {
                source: sketch.compose(),
                extra_args: vec![],
            },
        )
        .unwrap();
        assert!(matches!(result, RelayResult::Build(ref b) if b.success));
        assert!(!serial.is_open());

        let calls = runner.invocations();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].args.windows(2).any(|w| w == ["--port", "COM5"]));
        assert!(calls[0].args.windows(2).any(|w| w == ["--fqbn", "arduino:avr:uno"]));
        let uploaded = calls[0].sketch.as_deref().unwrap();
        assert!(uploaded.find("int led=13;").unwrap() < uploaded.find("void setup()").unwrap());
    }

    #[test]
    fn test_compile_requires_board() {
        let (mut session, _, runner) = session();
        let err = run(
            &mut session,
            RelayCommand::Compile {
                source: String::new(),
                extra_args: vec![],
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoBoardSelected);
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_upload_without_port() {
        let (mut session, _, runner) = session();
        run(&mut session, RelayCommand::SelectBoard { board: "nano".into() }).unwrap();
        let err = run(
            &mut session,
            RelayCommand::Upload {
                source: String::new(),
                extra_args: vec![],
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoPortConfigured);
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_unknown_board_keeps_status() {
        let (mut session, _, _) = session();
        run(&mut session, RelayCommand::SelectBoard { board: "uno".into() }).unwrap();
        let err = run(&mut session, RelayCommand::SelectBoard { board: "due".into() }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownBoard);
        assert_eq!(
            session.status().board.board().map(|b| b.fqbn.clone()),
            Some("arduino:avr:uno".to_string())
        );
    }

    #[test]
    fn test_serial_opens_lazily() {
        let (mut session, serial, _) = session();
        let err = run(&mut session, RelayCommand::Read { max_lines: 1 }).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoPortConfigured);

        run(
            &mut session,
            RelayCommand::ConfigureSerial {
                port: Some("COM5".into()),
                baud: Some(9600),
            },
        )
        .unwrap();
        let result = run(
            &mut session,
            RelayCommand::Write {
                text: "on".into(),
                append_newline: true,
            },
        )
        .unwrap();
        assert_eq!(result, RelayResult::Written { bytes: 3 });
        assert_eq!(serial.opens(), [("COM5".to_string(), 9600)]);
        assert!(session.status().connected);

        let result = run(&mut session, RelayCommand::Read { max_lines: 1 }).unwrap();
        assert_eq!(
            result,
            RelayResult::Lines {
                lines: vec!["ready".to_string()]
            }
        );
    }

    #[test]
    fn test_reconfigure_closes_stale_connection() {
        let (mut session, serial, _) = session();
        let configure = |port: &str| RelayCommand::ConfigureSerial {
            port: Some(port.into()),
            baud: None,
        };
        run(&mut session, configure("COM5")).unwrap();
        run(&mut session, RelayCommand::Open).unwrap();

        run(&mut session, configure("COM5")).unwrap();
        assert!(serial.is_open());
        run(&mut session, configure("COM6")).unwrap();
        assert!(!serial.is_open());
    }

    #[test]
    fn test_listen_duration_is_bounded() {
        let (mut session, _, _) = session();
        for duration_secs in [-1.0, f64::NAN, MAX_LISTEN_SECS + 1.0] {
            let err = run(
                &mut session,
                RelayCommand::Listen {
                    duration_secs,
                    prefix: None,
                },
            )
            .unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_status_and_listings() {
        let (mut session, _, _) = session();
        let status = run(&mut session, RelayCommand::Status).unwrap();
        assert!(matches!(
            status,
            RelayResult::Status(SessionStatus {
                board: BoardSelection::Unselected,
                connected: false,
                ..
            })
        ));

        let boards = run(&mut session, RelayCommand::ListBoards).unwrap();
        assert!(matches!(boards, RelayResult::Boards { ref boards } if boards.len() == 3));

        let ports = run(&mut session, RelayCommand::ListPorts).unwrap();
        assert_eq!(
            ports,
            RelayResult::Ports {
                ports: vec!["COM5".to_string(), "COM6".to_string()]
            }
        );
        assert_eq!(run(&mut session, RelayCommand::Close).unwrap(), RelayResult::Ack);
    }
}
