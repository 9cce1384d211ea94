//! Console command language
//!
//! One command per line. Blank lines and lines starting with `#` or `//` are
//! ignored. Text arguments (`code`, `serial write`) take the rest of the line
//! verbatim, with `\n` standing for a line break.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use sb_model::{Section, SectionSelector};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    ProjectInit(Option<String>),
    ProjectLoad(String),
    ProjectSave,
    ProjectClear(SectionSelector),
    ProjectShow,
    ProjectExport(PathBuf),
    BoardSelect(String),
    BoardStatus,
    BoardSerial { port: Option<String>, baud: Option<u32> },
    /// Compile the project sketch, or the sketch at the given path
    BoardCompile(Option<PathBuf>),
    BoardUpload(Option<PathBuf>),
    BoardList,
    BoardPorts,
    Code { section: Section, replace: bool, text: String },
    SerialOpen,
    SerialListen { duration: Duration, prefix: Option<String> },
    SerialRead(usize),
    SerialWrite { text: String, newline: bool },
    SerialClose,
    Help,
    Quit,
}

pub const HELP: &str = "\
project init [name]              create a project (selects uno)
project load <name>              open a saved project
project save                     write the project sketch
project clear [section|*]        empty one section or all of them
project show                     print the composed sketch
project export <path>            write the composed sketch elsewhere
board select <uno|nano|mega>     choose the target board
board status                     show board and serial settings
board serial [--port P] [--baud B]
board compile [path]             compile the project sketch or a file
board upload [path]              compile and flash
board list                       supported boards
board ports                      serial ports on the hardware host
code <section> [--replace] <text>
                                 add code to globals, setup, loop or functions
serial open                      open the configured port
serial listen <secs> [--prefix P]
serial read [n]                  up to n buffered lines (default 1)
serial write [--no-newline] <text>
serial close
help
quit";

impl ConsoleCommand {
    /// Parse one console line; `None` for blank and comment lines
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            return Ok(None);
        }

        let (group, rest) = split_word(line);
        let command = match group.to_ascii_lowercase().as_str() {
            "project" => parse_project(rest)?,
            "board" => parse_board(rest)?,
            "serial" => parse_serial(rest)?,
            "code" => parse_code(rest)?,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => bail!("Unknown command '{other}'. Type 'help' for a list of commands"),
        };
        Ok(Some(command))
    }
}

fn parse_project(args: &str) -> Result<ConsoleCommand> {
    let (action, rest) = split_word(args);
    let command = match action {
        "init" => ConsoleCommand::ProjectInit(single_optional(rest)?.map(str::to_string)),
        "load" => ConsoleCommand::ProjectLoad(single_required(rest, "project load <name>")?.to_string()),
        "save" => no_args(rest, ConsoleCommand::ProjectSave)?,
        "clear" => {
            let selector = single_optional(rest)?.unwrap_or("*");
            ConsoleCommand::ProjectClear(selector.parse()?)
        }
        "show" => no_args(rest, ConsoleCommand::ProjectShow)?,
        "export" => ConsoleCommand::ProjectExport(PathBuf::from(single_required(rest, "project export <path>")?)),
        other => bail!(unknown_action("project", other)),
    };
    Ok(command)
}

fn parse_board(args: &str) -> Result<ConsoleCommand> {
    let (action, rest) = split_word(args);
    let command = match action {
        "select" => ConsoleCommand::BoardSelect(single_required(rest, "board select <board>")?.to_string()),
        "status" => no_args(rest, ConsoleCommand::BoardStatus)?,
        "serial" => parse_board_serial(rest)?,
        "compile" => ConsoleCommand::BoardCompile(single_optional(rest)?.map(PathBuf::from)),
        "upload" => ConsoleCommand::BoardUpload(single_optional(rest)?.map(PathBuf::from)),
        "list" => no_args(rest, ConsoleCommand::BoardList)?,
        "ports" => no_args(rest, ConsoleCommand::BoardPorts)?,
        other => bail!(unknown_action("board", other)),
    };
    Ok(command)
}

fn parse_board_serial(args: &str) -> Result<ConsoleCommand> {
    let mut port = None;
    let mut baud = None;
    let mut words = args.split_whitespace();
    while let Some(flag) = words.next() {
        let value = words
            .next()
            .ok_or_else(|| anyhow!("'{flag}' needs a value"))?;
        match flag {
            "--port" => port = Some(value.to_string()),
            "--baud" => {
                baud = Some(
                    value
                        .parse::<u32>()
                        .with_context(|| format!("Invalid baud rate '{value}'"))?,
                )
            }
            other => bail!("Unknown option '{other}'. Usage: board serial [--port P] [--baud B]"),
        }
    }
    Ok(ConsoleCommand::BoardSerial { port, baud })
}

fn parse_serial(args: &str) -> Result<ConsoleCommand> {
    let (action, rest) = split_word(args);
    let command = match action {
        "open" => no_args(rest, ConsoleCommand::SerialOpen)?,
        "listen" => parse_listen(rest)?,
        "read" => {
            let max_lines = match single_optional(rest)? {
                Some(n) => n
                    .parse()
                    .with_context(|| format!("Invalid line count '{n}'"))?,
                None => 1,
            };
            ConsoleCommand::SerialRead(max_lines)
        }
        "write" => {
            let (newline, text) = match split_word(rest) {
                ("--no-newline", text) => (false, text),
                _ => (true, rest),
            };
            ConsoleCommand::SerialWrite {
                text: unescape(text),
                newline,
            }
        }
        "close" => no_args(rest, ConsoleCommand::SerialClose)?,
        other => bail!(unknown_action("serial", other)),
    };
    Ok(command)
}

fn parse_listen(args: &str) -> Result<ConsoleCommand> {
    const USAGE: &str = "serial listen <secs> [--prefix P]";

    let (secs, rest) = split_word(args);
    if secs.is_empty() {
        bail!("Missing duration. Usage: {USAGE}");
    }
    let duration = secs
        .parse::<f64>()
        .ok()
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .ok_or_else(|| anyhow!("Invalid duration '{secs}'. Expected a number of seconds"))?;

    let prefix = match split_word(rest) {
        ("", _) => None,
        ("--prefix", prefix) if !prefix.is_empty() => Some(prefix.to_string()),
        _ => bail!("Usage: {USAGE}"),
    };
    Ok(ConsoleCommand::SerialListen { duration, prefix })
}

fn parse_code(args: &str) -> Result<ConsoleCommand> {
    let (section, rest) = split_word(args);
    if section.is_empty() {
        bail!("Usage: code <section> [--replace] <text>");
    }
    let section: Section = section.parse()?;
    let (replace, text) = match split_word(rest) {
        ("--replace", text) => (true, text),
        _ => (false, rest),
    };
    Ok(ConsoleCommand::Code {
        section,
        replace,
        text: unescape(text),
    })
}

/// First whitespace-separated word and the remainder, left-trimmed
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim_start()),
        None => (s, ""),
    }
}

fn single_optional(args: &str) -> Result<Option<&str>> {
    let (word, rest) = split_word(args);
    if !rest.is_empty() {
        bail!("Unexpected argument '{rest}'");
    }
    Ok((!word.is_empty()).then_some(word))
}

fn single_required<'a>(args: &'a str, usage: &str) -> Result<&'a str> {
    single_optional(args)?.ok_or_else(|| anyhow!("Missing argument. Usage: {usage}"))
}

fn no_args(args: &str, command: ConsoleCommand) -> Result<ConsoleCommand> {
    if !args.is_empty() {
        bail!("Unexpected argument '{args}'");
    }
    Ok(command)
}

fn unknown_action(group: &str, action: &str) -> String {
    if action.is_empty() {
        format!("'{group}' needs an action. Type 'help' for a list of commands")
    } else {
        format!("Unknown action '{group} {action}'. Type 'help' for a list of commands")
    }
}

/// `\n` becomes a line break and `\\` a backslash
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
