//! Transport-independent relay request handling
//!
//! The server holds exactly one [`Session`]. Each request is authenticated,
//! decoded and then run with the session locked for its whole duration, so a
//! long upload or listen keeps every other request waiting instead of
//! interleaving on the hardware.

use std::sync::{Mutex, PoisonError};

use sb_model::{RelayError, RelayRequest, RelayResponse};

use crate::auth::Credential;
use crate::session::{Session, dispatch};

pub struct RelayServer {
    credential: Credential,
    session: Mutex<Session>,
}

impl RelayServer {
    pub fn new(session: Session, credential: Credential) -> Self {
        Self {
            credential,
            session: Mutex::new(session),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Handle one JSON request and return the JSON response
    pub fn handle_text(&self, text: &str) -> String {
        let response = match RelayRequest::parse(text) {
            Ok(request) => self.handle(request),
            Err(err) => {
                log::warn!("Rejected malformed request: {err}");
                RelayResponse::failure(0, err)
            }
        };
        encode_response(&response)
    }

    pub fn handle(&self, request: RelayRequest) -> RelayResponse {
        let id = request.id;
        if !self.credential.verify(request.token.as_deref()) {
            log::warn!("Rejected request {id} ({}): bad token", request.op);
            return RelayResponse::failure(id, RelayError::unauthorized());
        }

        let command = match request.command() {
            Ok(command) => command,
            Err(err) => {
                log::warn!("Rejected request {id}: {err}");
                return RelayResponse::failure(id, err);
            }
        };
        let op = command.op();

        // A panic in an earlier request must not wedge the relay
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = dispatch(&mut session, command);
        drop(session);

        match &outcome {
            Ok(_) => log::info!("{op} request {id} done"),
            Err(err) => log::info!("{op} request {id} failed: {err}"),
        }
        RelayResponse::from_outcome(id, op, outcome)
    }
}

/// Best-effort request id, for answering requests that could not be handled
pub fn request_id(text: &str) -> u64 {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| value.get("id")?.as_u64())
        .unwrap_or(0)
}

pub fn encode_response(response: &RelayResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        log::error!("Failed to encode response {}: {e}", response.id);
        format!(
            r#"{{"id":{},"success":false,"error":{{"kind":"Internal","message":"Failed to encode response"}}}}"#,
            response.id
        )
    })
}
