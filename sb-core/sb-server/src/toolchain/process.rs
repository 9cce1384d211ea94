use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{ProcessRunner, ToolOutput, ToolchainError};

const WAIT_INTERVAL: Duration = Duration::from_millis(50);

/// Runs programs as child processes
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Drain a child pipe on its own thread so a chatty process cannot block on a full pipe
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut bytes) {
                log::debug!("Error reading child output: {e}");
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

fn join(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(WAIT_INTERVAL);
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolchainError> {
        let name = program.display().to_string();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ToolchainError::NotFound(name.clone()),
                _ => ToolchainError::Spawn {
                    program: name.clone(),
                    source: e,
                },
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_deadline(&mut child, timeout).map_err(|e| ToolchainError::Spawn {
            program: name.clone(),
            source: e,
        })?;

        let Some(status) = status else {
            log::warn!("Killing {name} after {} s", timeout.as_secs());
            if let Err(e) = child.kill() {
                log::debug!("Failed to kill {name}: {e}");
            }
            let _ = child.wait();
            // Grandchildren may still hold the pipes open; leave the readers detached
            drop((stdout, stderr));
            return Err(ToolchainError::TimedOut {
                program: name,
                timeout,
            });
        };

        Ok(ToolOutput {
            success: status.success(),
            code: status.code(),
            stdout: join(stdout),
            stderr: join(stderr),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output_and_status() {
        let args = vec!["-c".to_string(), "echo built; echo oops >&2; exit 3".to_string()];
        let output = SystemRunner::new()
            .run(Path::new("sh"), &args, Duration::from_secs(10))
            .unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.log(), "built\noops");
    }

    #[test]
    fn test_missing_program() {
        let err = SystemRunner::new()
            .run(Path::new("/nonexistent/arduino-cli"), &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ToolchainError::NotFound(_)));
    }

    #[test]
    fn test_timeout_kills_process() {
        let args = vec!["-c".to_string(), "exec sleep 5".to_string()];
        let start = Instant::now();
        let err = SystemRunner::new()
            .run(Path::new("sh"), &args, Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, ToolchainError::TimedOut { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
