use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use sb_client::Executor;
use sb_model::{BoardId, BoardSelection, BuildOutcome, Operation, Sketch};
use sb_server::toolchain::SketchSource;

use super::args::ConsoleArgs;
use super::command::{ConsoleCommand, HELP};
use crate::messages::{format_build, format_status, print_error, print_success};
use crate::project::{DEFAULT_PROJECT_NAME, Project};

/// Board chosen when a new project is created on a session without one
const DEFAULT_BOARD: BoardId = BoardId::Uno;

/// Whether the console keeps reading after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Line console over an executor
///
/// Code written while no project is open goes to a scratch sketch that is
/// never saved. With a project open, every edit is written back to disk.
pub struct Console<W: Write> {
    executor: Box<dyn Executor>,
    projects_dir: PathBuf,
    project: Option<Project>,
    scratch: Sketch,
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(executor: Box<dyn Executor>, projects_dir: impl Into<PathBuf>, out: W) -> Self {
        Self {
            executor,
            projects_dir: projects_dir.into(),
            project: None,
            scratch: Sketch::new(),
            out,
        }
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_ref()
    }

    pub fn sketch(&self) -> &Sketch {
        match &self.project {
            Some(project) => project.sketch(),
            None => &self.scratch,
        }
    }

    fn sketch_mut(&mut self) -> &mut Sketch {
        match &mut self.project {
            Some(project) => project.sketch_mut(),
            None => &mut self.scratch,
        }
    }

    /// Run every line, stopping at the first failure
    pub fn run_script(&mut self, input: impl BufRead) -> Result<()> {
        for (index, line) in input.lines().enumerate() {
            let line = line.context("Failed to read script")?;
            let flow = self
                .run_line(&line)
                .with_context(|| format!("line {}: {}", index + 1, line.trim()))?;
            if flow == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    /// Prompt for commands until `quit` or end of input; failures are reported
    /// and the console keeps going
    pub fn run_interactive(&mut self, input: impl BufRead) -> Result<()> {
        let mut lines = input.lines();
        loop {
            write!(self.out, "sb> ")?;
            self.out.flush()?;
            let Some(line) = lines.next() else {
                writeln!(self.out)?;
                break;
            };
            match self.run_line(&line?) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => print_error(&format!("{e:#}"), &[]),
            }
        }
        Ok(())
    }

    pub fn run_line(&mut self, line: &str) -> Result<Flow> {
        match ConsoleCommand::parse(line)? {
            Some(command) => self.execute(command),
            None => Ok(Flow::Continue),
        }
    }

    pub fn execute(&mut self, command: ConsoleCommand) -> Result<Flow> {
        log::debug!("Console command {command:?}");
        match command {
            ConsoleCommand::ProjectInit(name) => {
                let name = name.as_deref().unwrap_or(DEFAULT_PROJECT_NAME);
                let project = Project::init(&self.projects_dir, name)?;
                writeln!(self.out, "Created project {name} in {}", project.dir().display())?;
                self.project = Some(project);
                if matches!(self.executor.status()?.board, BoardSelection::Unselected) {
                    self.executor.select_board(DEFAULT_BOARD.name())?;
                    writeln!(self.out, "Selected board {DEFAULT_BOARD}")?;
                }
            }
            ConsoleCommand::ProjectLoad(name) => {
                let project = Project::load(&self.projects_dir, &name)?;
                writeln!(self.out, "Loaded project {name}")?;
                self.project = Some(project);
            }
            ConsoleCommand::ProjectSave => {
                let project = self.require_project()?;
                let path = project.save()?;
                writeln!(self.out, "Saved {}", path.display())?;
            }
            ConsoleCommand::ProjectClear(selector) => {
                self.sketch_mut().clear(selector);
                self.autosave()?;
                writeln!(self.out, "Cleared")?;
            }
            ConsoleCommand::ProjectShow => {
                match &self.project {
                    Some(project) => writeln!(
                        self.out,
                        "Project {} in {}",
                        project.name(),
                        project.dir().display()
                    )?,
                    None => writeln!(self.out, "No project open")?,
                }
                let code = self.sketch().compose();
                write!(self.out, "{code}")?;
            }
            ConsoleCommand::ProjectExport(path) => {
                self.sketch().export(&path)?;
                writeln!(self.out, "Exported to {}", path.display())?;
            }
            ConsoleCommand::BoardSelect(board) => {
                let status = self.executor.select_board(&board)?;
                writeln!(self.out, "{}", format_status(&status))?;
            }
            ConsoleCommand::BoardStatus => {
                let status = self.executor.status()?;
                writeln!(self.out, "{}", format_status(&status))?;
            }
            ConsoleCommand::BoardSerial { port, baud } => {
                let status = self.executor.configure_serial(port.as_deref(), baud)?;
                writeln!(self.out, "{}", format_status(&status))?;
            }
            ConsoleCommand::BoardCompile(path) => {
                let source = self.build_source(path.as_deref())?;
                let outcome = self.executor.compile(&source, &[])?;
                self.report_build(Operation::Compile, &outcome)?;
            }
            ConsoleCommand::BoardUpload(path) => {
                let source = self.build_source(path.as_deref())?;
                let outcome = self.executor.upload(&source, &[])?;
                self.report_build(Operation::Upload, &outcome)?;
            }
            ConsoleCommand::BoardList => {
                for board in self.executor.list_boards()? {
                    writeln!(self.out, "{:<6} {}", board.id.name(), board.fqbn)?;
                }
            }
            ConsoleCommand::BoardPorts => {
                let ports = self.executor.list_ports()?;
                if ports.is_empty() {
                    writeln!(self.out, "No serial ports found")?;
                }
                for port in ports {
                    writeln!(self.out, "{port}")?;
                }
            }
            ConsoleCommand::Code {
                section,
                replace,
                text,
            } => {
                self.sketch_mut().set(section, &text, !replace);
                self.autosave()?;
            }
            ConsoleCommand::SerialOpen => {
                let status = self.executor.open()?;
                writeln!(self.out, "{}", format_status(&status))?;
            }
            ConsoleCommand::SerialListen { duration, prefix } => {
                let lines = self.executor.listen(duration, prefix.as_deref())?;
                self.print_lines(&lines)?;
            }
            ConsoleCommand::SerialRead(max_lines) => {
                let lines = self.executor.read(max_lines)?;
                self.print_lines(&lines)?;
            }
            ConsoleCommand::SerialWrite { text, newline } => {
                let bytes = self.executor.write(&text, newline)?;
                writeln!(self.out, "Sent {bytes} bytes")?;
            }
            ConsoleCommand::SerialClose => {
                self.executor.close()?;
                writeln!(self.out, "Serial connection closed")?;
            }
            ConsoleCommand::Help => writeln!(self.out, "{HELP}")?,
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn require_project(&self) -> Result<&Project> {
        match &self.project {
            Some(project) => Ok(project),
            None => bail!("No project open. Use 'project init <name>' or 'project load <name>'"),
        }
    }

    fn autosave(&self) -> Result<()> {
        if let Some(project) = &self.project {
            project.save()?;
        }
        Ok(())
    }

    /// Source for a build: a sketch file on this machine, or the open sketch
    fn build_source(&self, path: Option<&Path>) -> Result<String> {
        match path {
            Some(path) => SketchSource::Path(path.to_path_buf())
                .read_text()
                .with_context(|| format!("Failed to read sketch {}", path.display())),
            None => Ok(self.sketch().compose()),
        }
    }

    fn report_build(&mut self, op: Operation, outcome: &BuildOutcome) -> Result<()> {
        let action = match op {
            Operation::Upload => "Upload",
            _ => "Compile",
        };
        writeln!(self.out, "{}", format_build(action, outcome))?;
        if let Some(project) = &self.project {
            let path = project.save_log(op.as_str(), &outcome.log)?;
            log::debug!("Saved build log to {}", path.display());
        }
        if !outcome.success {
            bail!("{action} failed");
        }
        Ok(())
    }

    fn print_lines(&mut self, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            writeln!(self.out, "(no data)")?;
        }
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }
}

/// Entry point for `sb console`
pub fn handle_console(args: ConsoleArgs) -> Result<()> {
    let executor = args.target.executor()?;
    let mut console = Console::new(executor, &args.projects_dir, std::io::stdout());

    match &args.script {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open script {}", path.display()))?;
            console.run_script(std::io::BufReader::new(file))?;
            print_success(&format!("Script {} finished", path.display()), &[]);
        }
        None => {
            println!("SketchBridge console on {}. Type 'help' for commands", args.target.host()?);
            console.run_interactive(std::io::stdin().lock())?;
        }
    }
    Ok(())
}
