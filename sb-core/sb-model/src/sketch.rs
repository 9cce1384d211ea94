//! Sketch section store
//!
//! A sketch is kept as four named sections, each an ordered list of fragments
//! (one fragment per write). `Sketch::compose` renders them through a fixed
//! template:
//!
//! ```text
//! #include <Arduino.h>
//!
//! //**Global variables**
//! <globals, verbatim>
//!
//! //**Setup**
//! void setup() {
//!     <setup body, tab-indented>
//! }
//!
//! //**Loop**
//! void loop() {
//!     <loop body, tab-indented>
//! }
//!
//! //**Functions**
//! <functions, verbatim>
//! ```
//!
//! Empty sections still produce their marker and, for setup/loop, the
//! function scaffolding with an empty body.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RelayError};

const HEADER: &str = "#include <Arduino.h>";
const GLOBALS_MARKER: &str = "//**Global variables**";
const SETUP_MARKER: &str = "//**Setup**";
const LOOP_MARKER: &str = "//**Loop**";
const FUNCTIONS_MARKER: &str = "//**Functions**";

/// Named, independently editable part of a sketch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Globals,
    Setup,
    Loop,
    Functions,
}

impl Section {
    /// All sections in composition order
    pub const ALL: [Section; 4] = [
        Section::Globals,
        Section::Setup,
        Section::Loop,
        Section::Functions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Globals => "globals",
            Section::Setup => "setup",
            Section::Loop => "loop",
            Section::Functions => "functions",
        }
    }

    fn index(self) -> usize {
        match self {
            Section::Globals => 0,
            Section::Setup => 1,
            Section::Loop => 2,
            Section::Functions => 3,
        }
    }

    fn marker(self) -> &'static str {
        match self {
            Section::Globals => GLOBALS_MARKER,
            Section::Setup => SETUP_MARKER,
            Section::Loop => LOOP_MARKER,
            Section::Functions => FUNCTIONS_MARKER,
        }
    }

    /// Function signature wrapping the body, for setup and loop
    fn wrapper(self) -> Option<&'static str> {
        match self {
            Section::Setup => Some("void setup()"),
            Section::Loop => Some("void loop()"),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = SketchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "globals" => Ok(Section::Globals),
            "setup" => Ok(Section::Setup),
            "loop" => Ok(Section::Loop),
            "functions" => Ok(Section::Functions),
            _ => Err(SketchError::InvalidSection(s.trim().to_string())),
        }
    }
}

/// Target of a clear operation: one section or `*` for all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSelector {
    All,
    One(Section),
}

impl FromStr for SectionSelector {
    type Err = SketchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "*" {
            Ok(SectionSelector::All)
        } else {
            s.parse().map(SectionSelector::One)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SketchError {
    #[error("Unknown section '{0}'. Expected one of: globals, setup, loop, functions")]
    InvalidSection(String),
    #[error("Sketch text does not contain any recognised section")]
    Unstructured,
    #[error("Failed to write sketch to '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SketchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SketchError::InvalidSection(_) | SketchError::Unstructured => ErrorKind::InvalidSection,
            SketchError::Io { .. } => ErrorKind::Io,
        }
    }
}

impl From<SketchError> for RelayError {
    fn from(err: SketchError) -> Self {
        RelayError::new(err.kind(), err.to_string())
    }
}

/// In-memory sketch, one fragment list per section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sketch {
    sections: [Vec<String>; 4],
}

impl Sketch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write content to a section
    ///
    /// With `append`, the content becomes a new fragment after the existing
    /// ones; otherwise it replaces the whole section. Content is trimmed and
    /// empty content adds nothing.
    pub fn set(&mut self, section: Section, content: &str, append: bool) {
        let fragments = &mut self.sections[section.index()];
        if !append {
            fragments.clear();
        }
        let content = content.trim();
        if !content.is_empty() {
            fragments.push(content.to_string());
        }
    }

    /// Like `set`, with the section given by name
    pub fn set_named(&mut self, name: &str, content: &str, append: bool) -> Result<(), SketchError> {
        let section: Section = name.parse()?;
        self.set(section, content, append);
        Ok(())
    }

    pub fn clear(&mut self, selector: SectionSelector) {
        match selector {
            SectionSelector::All => self.sections.iter_mut().for_each(Vec::clear),
            SectionSelector::One(section) => self.sections[section.index()].clear(),
        }
    }

    pub fn section(&self, section: Section) -> &[String] {
        &self.sections[section.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Vec::is_empty)
    }

    /// Render the full sketch source
    pub fn compose(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push_str("\n\n");

        self.push_verbatim(&mut out, Section::Globals);
        out.push('\n');
        self.push_wrapped(&mut out, Section::Setup);
        out.push('\n');
        self.push_wrapped(&mut out, Section::Loop);
        out.push('\n');
        self.push_verbatim(&mut out, Section::Functions);

        out
    }

    fn push_verbatim(&self, out: &mut String, section: Section) {
        out.push_str(section.marker());
        out.push('\n');
        for fragment in self.section(section) {
            out.push_str(fragment);
            out.push('\n');
        }
    }

    fn push_wrapped(&self, out: &mut String, section: Section) {
        out.push_str(section.marker());
        out.push('\n');
        out.push_str(section.wrapper().unwrap_or_default());
        out.push_str(" {\n");
        for fragment in self.section(section) {
            for line in fragment.lines() {
                if !line.is_empty() {
                    out.push('\t');
                    out.push_str(line);
                }
                out.push('\n');
            }
        }
        out.push_str("}\n");
    }

    /// Write the composed sketch to `path`, creating parent directories
    pub fn export(&self, path: &Path) -> Result<(), SketchError> {
        let io_err = |source| SketchError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.compose()).map_err(io_err)?;
        log::debug!("Exported sketch to {}", path.display());
        Ok(())
    }

    /// Rebuild a sketch from composed source text
    ///
    /// Each section's body becomes a single fragment. Only the section markers
    /// switch sections, so function prototypes or definitions inside globals
    /// and functions stay where they are. Any other text before the first
    /// marker is rejected.
    pub fn import(text: &str) -> Result<Self, SketchError> {
        let mut raw: [Vec<&str>; 4] = Default::default();
        let mut current: Option<Section> = None;

        for line in text.lines() {
            let trimmed = line.trim();

            if let Some(section) = Section::ALL.iter().find(|s| s.marker() == trimmed) {
                current = Some(*section);
                continue;
            }

            match current {
                Some(section) => raw[section.index()].push(line),
                None if trimmed.is_empty() || trimmed == HEADER => {}
                None => return Err(SketchError::Unstructured),
            }
        }

        if current.is_none() {
            return Err(SketchError::Unstructured);
        }

        let mut sketch = Sketch::new();
        for section in Section::ALL {
            let lines = &raw[section.index()];
            let body = match section.wrapper() {
                Some(wrapper) => unwrap_function_body(lines, wrapper),
                None => lines.join("\n"),
            };
            sketch.set(section, &body, false);
        }
        Ok(sketch)
    }
}

/// Strip the `<wrapper> {` line, the closing brace and one level of indentation
///
/// The signature is only stripped when it is the first non-blank line of the
/// section, exactly as `compose` writes it.
fn unwrap_function_body(lines: &[&str], wrapper: &str) -> String {
    let opener = format!("{wrapper} {{");
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .filter(|&i| lines[i].trim() == opener)
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = lines
        .iter()
        .rposition(|l| l.trim() == "}")
        .filter(|&i| i >= start)
        .unwrap_or(lines.len());

    lines[start..end]
        .iter()
        .map(|l| l.strip_prefix('\t').unwrap_or(l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_sketch() -> Sketch {
        let mut sketch = Sketch::new();
        sketch.set(Section::Globals, "int led=13;", true);
        sketch.set(Section::Setup, "pinMode(led,OUTPUT);", true);
        sketch.set(Section::Loop, "digitalWrite(led,HIGH);", true);
        sketch
    }

    #[test]
    fn test_compose_is_idempotent() {
        let mut sketch = example_sketch();
        sketch.set(Section::Functions, "void blink() {\n  toggle();\n}", true);

        let first = sketch.compose();
        let second = sketch.compose();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compose_depends_only_on_final_contents() {
        let mut a = Sketch::new();
        a.set(Section::Loop, "first();", true);
        a.set(Section::Loop, "discarded();", false);
        a.set(Section::Loop, "second();", true);

        let mut b = Sketch::new();
        b.set(Section::Loop, "discarded();", true);
        b.set(Section::Loop, "second();", true);

        assert_ne!(a.compose(), b.compose());

        let mut c = Sketch::new();
        c.set(Section::Loop, "discarded();", true);
        c.set(Section::Loop, "second();", true);
        assert_eq!(b.compose(), c.compose());
    }

    #[test]
    fn test_empty_sketch_emits_scaffolding() {
        let text = Sketch::new().compose();

        assert!(text.contains("void setup() {\n}\n"));
        assert!(text.contains("void loop() {\n}\n"));
        assert!(text.contains(GLOBALS_MARKER));
        assert!(text.contains(FUNCTIONS_MARKER));
        assert!(text.find("void setup()").unwrap() < text.find("void loop()").unwrap());
    }

    #[test]
    fn test_example_scenario_ordering() {
        let text = example_sketch().compose();

        let globals = text.find("int led=13;").unwrap();
        let setup = text.find("void setup() {").unwrap();
        let setup_line = text.find("\tpinMode(led,OUTPUT);").unwrap();
        let loop_fn = text.find("void loop() {").unwrap();
        let loop_line = text.find("\tdigitalWrite(led,HIGH);").unwrap();

        assert!(globals < setup);
        assert!(setup < setup_line && setup_line < loop_fn);
        assert!(loop_fn < loop_line);
        // globals sit at top level, not inside a function
        assert!(text.contains("\nint led=13;\n"));
    }

    #[test]
    fn test_append_keeps_write_order() {
        let mut sketch = Sketch::new();
        sketch.set(Section::Setup, "Serial.begin(9600);", true);
        sketch.set(Section::Setup, "pinMode(13, OUTPUT);", true);
        assert_eq!(
            sketch.section(Section::Setup),
            ["Serial.begin(9600);", "pinMode(13, OUTPUT);"]
        );

        sketch.set(Section::Setup, "  pinMode(2, INPUT);  ", false);
        assert_eq!(sketch.section(Section::Setup), ["pinMode(2, INPUT);"]);
    }

    #[test]
    fn test_invalid_section_rejected() {
        let mut sketch = Sketch::new();
        let err = sketch.set_named("interrupts", "x();", true).unwrap_err();
        assert!(matches!(err, SketchError::InvalidSection(ref name) if name == "interrupts"));
        assert_eq!(err.kind(), ErrorKind::InvalidSection);
        assert!(sketch.is_empty());

        sketch.set_named(" LOOP ", "x();", true).unwrap();
        assert_eq!(sketch.section(Section::Loop), ["x();"]);
    }

    #[test]
    fn test_clear_one_and_all() {
        let mut sketch = example_sketch();

        sketch.clear("setup".parse().unwrap());
        assert!(sketch.section(Section::Setup).is_empty());
        assert_eq!(sketch.section(Section::Globals), ["int led=13;"]);

        sketch.clear("*".parse().unwrap());
        assert!(sketch.is_empty());
        assert!("nope".parse::<SectionSelector>().is_err());
    }

    #[test]
    fn test_import_restores_composition() {
        let mut sketch = example_sketch();
        sketch.set(Section::Setup, "if (ready) {\n\tSerial.begin(9600);\n}", true);
        sketch.set(Section::Functions, "int twice(int x) {\n  return 2 * x;\n}", true);
        let text = sketch.compose();

        let imported = Sketch::import(&text).unwrap();
        assert_eq!(imported.compose(), text);
        assert_eq!(
            imported.section(Section::Setup),
            ["pinMode(led,OUTPUT);\nif (ready) {\n\tSerial.begin(9600);\n}"]
        );
    }

    #[test]
    fn test_import_keeps_prototypes_in_globals() {
        let mut sketch = Sketch::new();
        sketch.set(Section::Globals, "void setup();\nint led = 13;", true);
        sketch.set(Section::Loop, "digitalWrite(led, HIGH);", true);
        sketch.set(Section::Functions, "void loop();", true);
        let text = sketch.compose();

        let imported = Sketch::import(&text).unwrap();
        assert_eq!(imported.section(Section::Globals), ["void setup();\nint led = 13;"]);
        assert!(imported.section(Section::Setup).is_empty());
        assert_eq!(imported.section(Section::Loop), ["digitalWrite(led, HIGH);"]);
        assert_eq!(imported.section(Section::Functions), ["void loop();"]);
        assert_eq!(imported.compose(), text);
        assert_eq!(Sketch::import(&imported.compose()).unwrap(), imported);
    }

    #[test]
    fn test_import_empty_composition() {
        let imported = Sketch::import(&Sketch::new().compose()).unwrap();
        assert!(imported.is_empty());
    }

    #[test]
    fn test_import_rejects_unstructured_text() {
        assert!(matches!(
            Sketch::import("int x = 1;\n"),
            Err(SketchError::Unstructured)
        ));
        assert!(matches!(Sketch::import(""), Err(SketchError::Unstructured)));
    }

    #[test]
    fn test_export_writes_composed_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("blink.ino");

        let sketch = example_sketch();
        sketch.export(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, sketch.compose());
    }

    #[test]
    fn test_export_failure_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be overwritten as a file
        let err = Sketch::new().export(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
