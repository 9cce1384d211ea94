//! Recording toolchain runner for testing and development
//!
//! Never starts a process. Each call is recorded with its arguments, the
//! sketch text found in the sketch directory and the time span it occupied,
//! which is enough to check argument layout and that invocations never
//! overlap.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{ProcessRunner, SKETCH_NAME, ToolOutput, ToolchainError};

/// One recorded toolchain call
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Contents of the sketch file at the time of the call
    pub sketch: Option<String>,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug, Clone)]
enum Behaviour {
    Succeed,
    Fail(String),
    Missing,
}

#[derive(Debug, Clone)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<Invocation>>>,
    delay: Duration,
    behaviour: Behaviour,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            behaviour: Behaviour::Succeed,
        }
    }

    /// Make every call take at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report a failed build with `log` on stderr
    pub fn failing(mut self, log: &str) -> Self {
        self.behaviour = Behaviour::Fail(log.to_string());
        self
    }

    /// Behave as if the program does not exist
    pub fn unavailable(mut self) -> Self {
        self.behaviour = Behaviour::Missing;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Invocation>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().clone()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, program: &Path, args: &[String], _timeout: Duration) -> Result<ToolOutput, ToolchainError> {
        if let Behaviour::Missing = self.behaviour {
            return Err(ToolchainError::NotFound(program.display().to_string()));
        }

        let started = Instant::now();
        let sketch = args
            .last()
            .map(|dir| Path::new(dir).join(format!("{SKETCH_NAME}.ino")))
            .and_then(|file| std::fs::read_to_string(file).ok());
        std::thread::sleep(self.delay);

        self.lock().push(Invocation {
            program: program.to_path_buf(),
            args: args.to_vec(),
            sketch,
            started,
            finished: Instant::now(),
        });

        Ok(match &self.behaviour {
            Behaviour::Fail(log) => ToolOutput {
                success: false,
                code: Some(1),
                stdout: String::new(),
                stderr: log.clone(),
            },
            _ => ToolOutput {
                success: true,
                code: Some(0),
                stdout: "Sketch uses 924 bytes (2%) of program storage space.".to_string(),
                stderr: String::new(),
            },
        })
    }
}
