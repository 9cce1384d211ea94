use std::time::Duration;

use sb_model::{RelayCommand, RelayError, RelayRequest, RelayResult};

use crate::executor::Executor;
use crate::transport::ClientTransport;

/// Time allowed for a request on top of any listen window
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time allowed for compile and upload requests
pub const BUILD_ALLOWANCE: Duration = Duration::from_secs(300);

/// Forwards every command to a relay and returns its answer
///
/// One request is in flight at a time and nothing is retried: transport
/// failures come back as `ConnectionFailed` or `Timeout`, and errors reported
/// by the relay are returned unchanged.
pub struct RemoteExecutor {
    transport: Box<dyn ClientTransport>,
    token: Option<String>,
    next_id: u64,
    timeout: Duration,
}

impl RemoteExecutor {
    pub fn new(transport: Box<dyn ClientTransport>, token: Option<String>) -> Self {
        Self {
            transport,
            token,
            next_id: 1,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Executor for the relay at a `ws://` URL
    #[cfg(feature = "ws")]
    pub fn connect(url: &str, token: Option<String>) -> Self {
        Self::new(Box::new(crate::transport::WebSocketTransport::new(url)), token)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn timeout_for(&self, command: &RelayCommand) -> Duration {
        match command {
            RelayCommand::Listen { duration_secs, .. } => {
                self.timeout + Duration::try_from_secs_f64(*duration_secs).unwrap_or_default()
            }
            RelayCommand::Compile { .. } | RelayCommand::Upload { .. } => self.timeout + BUILD_ALLOWANCE,
            _ => self.timeout,
        }
    }
}

impl Executor for RemoteExecutor {
    fn execute(&mut self, command: RelayCommand) -> Result<RelayResult, RelayError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = RelayRequest::new(id, &command, self.token.clone());
        let timeout = self.timeout_for(&command);
        log::debug!("Sending {} request {id}", request.op);

        let response = self.transport.round_trip(&request, timeout)?;
        response.into_result()
    }
}
