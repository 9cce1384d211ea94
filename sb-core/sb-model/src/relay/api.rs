use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::board::{BoardInfo, BoardSelection, SerialConfig};
use crate::error::{ErrorKind, RelayError};
use crate::relay::command::{Operation, RelayCommand};

/// Request envelope
///
/// `op` and `payload` stay untyped here; see [`RelayRequest::command`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRequest {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub op: String,
    #[serde(default)]
    pub payload: Value,
}

impl RelayRequest {
    pub fn new(id: u64, command: &RelayCommand, token: Option<String>) -> Self {
        Self {
            id,
            token,
            op: command.op().as_str().to_string(),
            payload: command.payload(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text).map_err(|e| RelayError::malformed(format!("Invalid request: {e}")))
    }

    /// Decode the operation name, then its payload
    pub fn command(&self) -> Result<RelayCommand, RelayError> {
        let op: Operation = self.op.parse()?;
        RelayCommand::decode(op, self.payload.clone())
    }
}

/// Result of a compile or upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub success: bool,
    pub log: String,
}

/// Snapshot returned by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub board: BoardSelection,
    pub serial: SerialConfig,
    /// Whether the serial connection is currently open
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RelayResult {
    /// Operation completed with nothing to report
    Ack,
    Status(SessionStatus),
    Build(BuildOutcome),
    Lines { lines: Vec<String> },
    Written { bytes: usize },
    Boards { boards: Vec<BoardInfo> },
    Ports { ports: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RelayResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RelayError>,
}

impl RelayResponse {
    pub fn ok(id: u64, result: RelayResult) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: u64, error: RelayError) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(error),
        }
    }

    /// Build a response from a dispatch outcome
    ///
    /// A failed build still succeeds at dispatch level; on the wire it is
    /// reported as `CompileFailed`/`UploadFailed` with the log kept in
    /// `result`.
    pub fn from_outcome(id: u64, op: Operation, outcome: Result<RelayResult, RelayError>) -> Self {
        match outcome {
            Ok(RelayResult::Build(build)) if !build.success => {
                let kind = if op == Operation::Upload {
                    ErrorKind::UploadFailed
                } else {
                    ErrorKind::CompileFailed
                };
                let message = format!("{op} failed");
                Self {
                    id,
                    success: false,
                    result: Some(RelayResult::Build(build)),
                    error: Some(RelayError::new(kind, message)),
                }
            }
            Ok(result) => Self::ok(id, result),
            Err(error) => Self::failure(id, error),
        }
    }

    /// Inverse of [`RelayResponse::from_outcome`]
    pub fn into_result(self) -> Result<RelayResult, RelayError> {
        match (self.success, self.result, self.error) {
            (true, Some(result), _) => Ok(result),
            (false, Some(result @ RelayResult::Build(_)), Some(error))
                if matches!(error.kind, ErrorKind::CompileFailed | ErrorKind::UploadFailed) =>
            {
                Ok(result)
            }
            (false, _, Some(error)) => Err(error),
            _ => Err(RelayError::malformed(
                "Response carries neither a result nor an error",
            )),
        }
    }

    pub fn parse(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text)
            .map_err(|e| RelayError::malformed(format!("Invalid response: {e}")))
    }
}
