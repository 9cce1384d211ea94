//! Toolchain Gateway
//!
//! Compiles and uploads sketches by running an `arduino-cli` compatible
//! program. The source is written to a throwaway sketch directory
//! (`<tmp>/sketch/sketch.ino`, the toolchain insists that the file name
//! matches the directory) which is removed once the process exits.
//!
//! The program is resolved in this order: explicit override, the
//! `ARDUINO_CLI` environment variable, then `arduino-cli` on `PATH`.

pub mod fake;
mod process;

pub use fake::{Invocation, RecordingRunner};
pub use process::SystemRunner;

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sb_model::{BoardId, BuildOutcome, ErrorKind, RelayError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
pub const TOOLCHAIN_ENV: &str = "ARDUINO_CLI";
const DEFAULT_PROGRAM: &str = "arduino-cli";
const SKETCH_NAME: &str = "sketch";

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// stdout followed by stderr, as shown to the user
    pub fn log(&self) -> String {
        match (self.stdout.trim_end(), self.stderr.trim_end()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{out}\n{err}"),
        }
    }
}

/// Runs external programs to completion
pub trait ProcessRunner: Send {
    /// Run `program` with `args`, killing it after `timeout`
    fn run(&self, program: &Path, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolchainError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("Toolchain '{0}' not found. Install arduino-cli or set ARDUINO_CLI")]
    NotFound(String),
    #[error("Failed to start toolchain '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Toolchain '{program}' did not finish within {} s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
    #[error("No serial port configured. Use configure-serial to set one before uploading")]
    NoPortConfigured,
    #[error("Failed to prepare sketch directory: {0}")]
    Workspace(#[source] io::Error),
}

impl ToolchainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolchainError::NotFound(_)
            | ToolchainError::Spawn { .. }
            | ToolchainError::TimedOut { .. } => ErrorKind::ToolchainUnavailable,
            ToolchainError::NoPortConfigured => ErrorKind::NoPortConfigured,
            ToolchainError::Workspace(_) => ErrorKind::Io,
        }
    }
}

impl From<ToolchainError> for RelayError {
    fn from(err: ToolchainError) -> Self {
        RelayError::new(err.kind(), err.to_string())
    }
}

/// Sketch given either as source text or as a path on the local machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SketchSource {
    Text(String),
    /// A `.ino` file, or a sketch directory containing `<dir name>.ino`
    Path(PathBuf),
}

impl SketchSource {
    pub fn read_text(&self) -> io::Result<String> {
        match self {
            SketchSource::Text(text) => Ok(text.clone()),
            SketchSource::Path(path) if path.is_dir() => {
                let name = path.file_name().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "sketch directory has no name")
                })?;
                let mut file = path.join(name);
                file.set_extension("ino");
                std::fs::read_to_string(file)
            }
            SketchSource::Path(path) => std::fs::read_to_string(path),
        }
    }
}

/// Pick the toolchain program: override, then environment, then `PATH`
pub fn resolve_program(
    override_path: Option<&Path>,
    env_value: Option<OsString>,
    path_var: Option<OsString>,
) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return Some(path.to_path_buf());
    }
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(value));
    }
    let exe = format!("{DEFAULT_PROGRAM}{}", std::env::consts::EXE_SUFFIX);
    path_var.and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(&exe))
            .find(|candidate| candidate.is_file())
    })
}

pub struct ToolchainGateway {
    runner: Box<dyn ProcessRunner>,
    program: Option<PathBuf>,
    timeout: Duration,
}

impl ToolchainGateway {
    pub fn new(runner: Box<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            program: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use this program instead of looking one up
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn program(&self) -> Result<PathBuf, ToolchainError> {
        resolve_program(
            self.program.as_deref(),
            std::env::var_os(TOOLCHAIN_ENV),
            std::env::var_os("PATH"),
        )
        .ok_or_else(|| ToolchainError::NotFound(DEFAULT_PROGRAM.to_string()))
    }

    pub fn compile(&self, source: &str, board: BoardId, extra_args: &[String]) -> Result<BuildOutcome, ToolchainError> {
        log::info!("Compiling sketch for {}", board.fqbn());
        self.invoke(source, vec!["compile".to_string()], board, extra_args)
    }

    /// Compile and flash in one toolchain invocation
    pub fn upload(
        &self,
        source: &str,
        board: BoardId,
        port: Option<&str>,
        extra_args: &[String],
    ) -> Result<BuildOutcome, ToolchainError> {
        let port = port.ok_or(ToolchainError::NoPortConfigured)?;
        log::info!("Uploading sketch to {} on {port}", board.fqbn());
        let leading = vec![
            "compile".to_string(),
            "--upload".to_string(),
            "--port".to_string(),
            port.to_string(),
        ];
        self.invoke(source, leading, board, extra_args)
    }

    fn invoke(
        &self,
        source: &str,
        mut args: Vec<String>,
        board: BoardId,
        extra_args: &[String],
    ) -> Result<BuildOutcome, ToolchainError> {
        let program = self.program()?;

        let workspace = tempfile::Builder::new()
            .prefix("sb-sketch-")
            .tempdir()
            .map_err(ToolchainError::Workspace)?;
        let sketch_dir = workspace.path().join(SKETCH_NAME);
        std::fs::create_dir(&sketch_dir).map_err(ToolchainError::Workspace)?;
        std::fs::write(sketch_dir.join(format!("{SKETCH_NAME}.ino")), source)
            .map_err(ToolchainError::Workspace)?;

        args.push("--fqbn".to_string());
        args.push(board.fqbn().to_string());
        args.extend(extra_args.iter().cloned());
        args.push(sketch_dir.to_string_lossy().into_owned());

        log::debug!("Running {} {}", program.display(), args.join(" "));
        let output = self.runner.run(&program, &args, self.timeout)?;
        if !output.success {
            log::warn!("Toolchain exited with status {:?}", output.code);
        }
        Ok(BuildOutcome {
            success: output.success,
            log: output.log(),
        })
    }
}
