use sb_model::{RelayCommand, RelayError, RelayResult};
use sb_server::{Session, dispatch};

use crate::executor::Executor;

/// Runs commands against hardware attached to this machine
pub struct LocalExecutor {
    session: Session,
}

impl LocalExecutor {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Executor for LocalExecutor {
    fn execute(&mut self, command: RelayCommand) -> Result<RelayResult, RelayError> {
        dispatch(&mut self.session, command)
    }
}
