use core::fmt;
use core::str::FromStr;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::RelayError;

/// Operation names accepted by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SelectBoard,
    ConfigureSerial,
    Compile,
    Upload,
    Listen,
    Read,
    Write,
    Status,
    Open,
    Close,
    ListBoards,
    ListPorts,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::SelectBoard,
        Operation::ConfigureSerial,
        Operation::Compile,
        Operation::Upload,
        Operation::Listen,
        Operation::Read,
        Operation::Write,
        Operation::Status,
        Operation::Open,
        Operation::Close,
        Operation::ListBoards,
        Operation::ListPorts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SelectBoard => "select-board",
            Operation::ConfigureSerial => "configure-serial",
            Operation::Compile => "compile",
            Operation::Upload => "upload",
            Operation::Listen => "listen",
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Status => "status",
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::ListBoards => "list-boards",
            Operation::ListPorts => "list-ports",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| RelayError::unknown_operation(s))
    }
}

/// A decoded relay operation with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum RelayCommand {
    SelectBoard {
        board: String,
    },
    ConfigureSerial {
        port: Option<String>,
        baud: Option<u32>,
    },
    Compile {
        source: String,
        extra_args: Vec<String>,
    },
    Upload {
        source: String,
        extra_args: Vec<String>,
    },
    Listen {
        duration_secs: f64,
        prefix: Option<String>,
    },
    Read {
        max_lines: usize,
    },
    Write {
        text: String,
        append_newline: bool,
    },
    Status,
    Open,
    Close,
    ListBoards,
    ListPorts,
}

#[derive(Deserialize)]
struct SelectBoardPayload {
    board: String,
}

#[derive(Deserialize)]
struct SerialPayload {
    #[serde(default)]
    port: Option<String>,
    #[serde(default)]
    baud: Option<u32>,
}

#[derive(Deserialize)]
struct BuildPayload {
    source: String,
    #[serde(default)]
    extra_args: Vec<String>,
}

#[derive(Deserialize)]
struct ListenPayload {
    duration_secs: f64,
    #[serde(default)]
    prefix: Option<String>,
}

#[derive(Deserialize)]
struct ReadPayload {
    #[serde(default = "one")]
    max_lines: usize,
}

#[derive(Deserialize)]
struct WritePayload {
    text: String,
    #[serde(default = "yes")]
    append_newline: bool,
}

fn one() -> usize {
    1
}

fn yes() -> bool {
    true
}

fn decode_payload<T: DeserializeOwned>(op: Operation, payload: Value) -> Result<T, RelayError> {
    let payload = if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload
    };
    serde_json::from_value(payload)
        .map_err(|e| RelayError::malformed(format!("Invalid payload for '{op}': {e}")))
}

impl RelayCommand {
    /// Decode the payload of an already-recognised operation
    pub fn decode(op: Operation, payload: Value) -> Result<Self, RelayError> {
        let command = match op {
            Operation::SelectBoard => {
                let p: SelectBoardPayload = decode_payload(op, payload)?;
                RelayCommand::SelectBoard { board: p.board }
            }
            Operation::ConfigureSerial => {
                let p: SerialPayload = decode_payload(op, payload)?;
                RelayCommand::ConfigureSerial {
                    port: p.port,
                    baud: p.baud,
                }
            }
            Operation::Compile => {
                let p: BuildPayload = decode_payload(op, payload)?;
                RelayCommand::Compile {
                    source: p.source,
                    extra_args: p.extra_args,
                }
            }
            Operation::Upload => {
                let p: BuildPayload = decode_payload(op, payload)?;
                RelayCommand::Upload {
                    source: p.source,
                    extra_args: p.extra_args,
                }
            }
            Operation::Listen => {
                let p: ListenPayload = decode_payload(op, payload)?;
                RelayCommand::Listen {
                    duration_secs: p.duration_secs,
                    prefix: p.prefix,
                }
            }
            Operation::Read => {
                let p: ReadPayload = decode_payload(op, payload)?;
                RelayCommand::Read {
                    max_lines: p.max_lines,
                }
            }
            Operation::Write => {
                let p: WritePayload = decode_payload(op, payload)?;
                RelayCommand::Write {
                    text: p.text,
                    append_newline: p.append_newline,
                }
            }
            Operation::Status => RelayCommand::Status,
            Operation::Open => RelayCommand::Open,
            Operation::Close => RelayCommand::Close,
            Operation::ListBoards => RelayCommand::ListBoards,
            Operation::ListPorts => RelayCommand::ListPorts,
        };
        Ok(command)
    }

    pub fn op(&self) -> Operation {
        match self {
            RelayCommand::SelectBoard { .. } => Operation::SelectBoard,
            RelayCommand::ConfigureSerial { .. } => Operation::ConfigureSerial,
            RelayCommand::Compile { .. } => Operation::Compile,
            RelayCommand::Upload { .. } => Operation::Upload,
            RelayCommand::Listen { .. } => Operation::Listen,
            RelayCommand::Read { .. } => Operation::Read,
            RelayCommand::Write { .. } => Operation::Write,
            RelayCommand::Status => Operation::Status,
            RelayCommand::Open => Operation::Open,
            RelayCommand::Close => Operation::Close,
            RelayCommand::ListBoards => Operation::ListBoards,
            RelayCommand::ListPorts => Operation::ListPorts,
        }
    }

    /// Payload as sent on the wire
    pub fn payload(&self) -> Value {
        match self {
            RelayCommand::SelectBoard { board } => json!({ "board": board }),
            RelayCommand::ConfigureSerial { port, baud } => json!({ "port": port, "baud": baud }),
            RelayCommand::Compile { source, extra_args }
            | RelayCommand::Upload { source, extra_args } => {
                json!({ "source": source, "extra_args": extra_args })
            }
            RelayCommand::Listen {
                duration_secs,
                prefix,
            } => json!({ "duration_secs": duration_secs, "prefix": prefix }),
            RelayCommand::Read { max_lines } => json!({ "max_lines": max_lines }),
            RelayCommand::Write {
                text,
                append_newline,
            } => json!({ "text": text, "append_newline": append_newline }),
            RelayCommand::Status
            | RelayCommand::Open
            | RelayCommand::Close
            | RelayCommand::ListBoards
            | RelayCommand::ListPorts => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_unknown_operation() {
        let err = "reboot".parse::<Operation>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownOperation);
        assert_eq!("list-ports".parse::<Operation>().unwrap(), Operation::ListPorts);
    }

    #[test]
    fn test_decode_applies_defaults() {
        let cmd = RelayCommand::decode(Operation::Write, json!({ "text": "on" })).unwrap();
        assert_eq!(
            cmd,
            RelayCommand::Write {
                text: "on".to_string(),
                append_newline: true
            }
        );

        let cmd = RelayCommand::decode(Operation::Read, Value::Null).unwrap();
        assert_eq!(cmd, RelayCommand::Read { max_lines: 1 });

        let cmd = RelayCommand::decode(Operation::Compile, json!({ "source": "x" })).unwrap();
        assert_eq!(
            cmd,
            RelayCommand::Compile {
                source: "x".to_string(),
                extra_args: vec![]
            }
        );
    }

    #[test]
    fn test_decode_rejects_bad_payload() {
        let err = RelayCommand::decode(Operation::Listen, json!({ "duration_secs": "two" }))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRequest);
        assert!(err.message.contains("listen"));

        let err = RelayCommand::decode(Operation::SelectBoard, Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedRequest);
    }

    #[test]
    fn test_payload_decodes_back() {
        let cmd = RelayCommand::ConfigureSerial {
            port: Some("COM5".to_string()),
            baud: None,
        };
        let decoded = RelayCommand::decode(cmd.op(), cmd.payload()).unwrap();
        assert_eq!(decoded, cmd);
    }
}
