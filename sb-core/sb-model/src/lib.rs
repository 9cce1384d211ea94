//! SketchBridge data model.
//!
//! Types shared by the relay server, the client executors and the console:
//! - `sketch`: section store and deterministic sketch composition
//! - `board`: supported boards and the board/serial session state
//! - `relay`: request/response envelopes for the remote relay protocol
//! - `error`: the error taxonomy carried over the wire

pub mod board;
pub mod error;
pub mod relay;
pub mod sketch;

pub use board::{BoardError, BoardId, BoardInfo, BoardSelection, BoardSession, SerialConfig};
pub use error::{ErrorKind, RelayError};
pub use relay::{
    BuildOutcome, Operation, RelayCommand, RelayRequest, RelayResponse, RelayResult,
    SessionStatus,
};
pub use sketch::{Section, SectionSelector, Sketch, SketchError};
