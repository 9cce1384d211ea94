//! Board identity, selection and serial configuration

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RelayError};

/// Supported microcontroller boards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardId {
    Uno,
    Nano,
    Mega,
}

impl BoardId {
    pub const ALL: [BoardId; 3] = [BoardId::Uno, BoardId::Nano, BoardId::Mega];

    pub fn name(&self) -> &'static str {
        match self {
            BoardId::Uno => "uno",
            BoardId::Nano => "nano",
            BoardId::Mega => "mega",
        }
    }

    /// Fully-qualified board name understood by the toolchain
    pub fn fqbn(&self) -> &'static str {
        match self {
            BoardId::Uno => "arduino:avr:uno",
            BoardId::Nano => "arduino:avr:nano",
            BoardId::Mega => "arduino:avr:mega",
        }
    }

    pub fn default_baud(&self) -> u32 {
        115_200
    }

    pub fn info(&self) -> BoardInfo {
        BoardInfo {
            id: *self,
            fqbn: self.fqbn().to_string(),
            default_baud: self.default_baud(),
        }
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoardId {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        BoardId::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| BoardError::UnknownBoard(wanted.to_string()))
    }
}

/// Description of a board as reported by `status` and `list-boards`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub id: BoardId,
    pub fqbn: String,
    pub default_baud: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: Option<String>,
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: BoardId::Uno.default_baud(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "board", rename_all = "lowercase")]
pub enum BoardSelection {
    Unselected,
    Selected(BoardInfo),
}

impl BoardSelection {
    pub fn board(&self) -> Option<&BoardInfo> {
        match self {
            BoardSelection::Unselected => None,
            BoardSelection::Selected(info) => Some(info),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Unsupported board '{0}'. Supported boards: uno, nano, mega")]
    UnknownBoard(String),
    #[error("No board selected")]
    NoBoardSelected,
    #[error("Invalid baud rate {0}: must be greater than zero")]
    InvalidBaud(u32),
    #[error("Serial port name must not be empty")]
    EmptyPort,
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::UnknownBoard(_) => ErrorKind::UnknownBoard,
            BoardError::NoBoardSelected => ErrorKind::NoBoardSelected,
            BoardError::InvalidBaud(_) | BoardError::EmptyPort => ErrorKind::InvalidArgument,
        }
    }
}

impl From<BoardError> for RelayError {
    fn from(err: BoardError) -> Self {
        RelayError::new(err.kind(), err.to_string())
    }
}

/// Selected board and serial settings for one session
#[derive(Debug, Clone, Default)]
pub struct BoardSession {
    board: Option<BoardId>,
    serial: SerialConfig,
    serial_explicit: bool,
}

impl BoardSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a board by name
    ///
    /// The baud rate is reset to the board default unless serial settings
    /// were configured explicitly earlier in the session.
    pub fn select(&mut self, name: &str) -> Result<BoardInfo, BoardError> {
        let id: BoardId = name.parse()?;
        self.board = Some(id);
        if !self.serial_explicit {
            self.serial.baud = id.default_baud();
        }
        log::debug!("Selected board {} ({})", id, id.fqbn());
        Ok(id.info())
    }

    /// Update the port and/or baud rate; absent values are left unchanged
    pub fn configure_serial(
        &mut self,
        port: Option<&str>,
        baud: Option<u32>,
    ) -> Result<&SerialConfig, BoardError> {
        let port = match port.map(str::trim) {
            Some("") => return Err(BoardError::EmptyPort),
            other => other,
        };
        if let Some(0) = baud {
            return Err(BoardError::InvalidBaud(0));
        }

        if let Some(port) = port {
            self.serial.port = Some(port.to_string());
        }
        if let Some(baud) = baud {
            self.serial.baud = baud;
        }
        self.serial_explicit = true;
        Ok(&self.serial)
    }

    pub fn selection(&self) -> BoardSelection {
        match self.board {
            Some(id) => BoardSelection::Selected(id.info()),
            None => BoardSelection::Unselected,
        }
    }

    pub fn board(&self) -> Option<BoardId> {
        self.board
    }

    /// Selected board, or `NoBoardSelected`
    pub fn require_board(&self) -> Result<BoardId, BoardError> {
        self.board.ok_or(BoardError::NoBoardSelected)
    }

    pub fn serial(&self) -> &SerialConfig {
        &self.serial
    }

    pub fn list_boards() -> Vec<BoardInfo> {
        BoardId::ALL.iter().map(BoardId::info).collect()
    }
}
