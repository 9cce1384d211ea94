//! Named sketch projects on disk
//!
//! A project lives in `<projects dir>/<name>/`. The composed sketch is kept in
//! `<name>.ino` next to a `logs/` directory holding the last build output of
//! each operation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use sb_model::Sketch;

pub const DEFAULT_PROJECTS_DIR: &str = "projects";
pub const DEFAULT_PROJECT_NAME: &str = "new_project";

#[derive(Debug)]
pub struct Project {
    name: String,
    dir: PathBuf,
    sketch: Sketch,
}

impl Project {
    /// Create a new, empty project and write its scaffold sketch
    pub fn init(projects_dir: &Path, name: &str) -> Result<Self> {
        let name = validate_name(name)?;
        let dir = projects_dir.join(name);
        if dir.exists() {
            bail!(
                "Project '{name}' already exists in {}. Use 'project load {name}' to open it",
                projects_dir.display()
            );
        }

        let project = Self {
            name: name.to_string(),
            dir,
            sketch: Sketch::new(),
        };
        project.save()?;
        log::info!("Created project {name} in {}", project.dir.display());
        Ok(project)
    }

    /// Open an existing project and import its sections from the `.ino` file
    pub fn load(projects_dir: &Path, name: &str) -> Result<Self> {
        let name = validate_name(name)?;
        let dir = projects_dir.join(name);
        let path = sketch_path(&dir, name);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Project '{name}' has no sketch at {}", path.display()))?;
        let sketch = Sketch::import(&text).with_context(|| format!("Failed to import {}", path.display()))?;

        log::info!("Loaded project {name} from {}", dir.display());
        Ok(Self {
            name: name.to_string(),
            dir,
            sketch,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sketch_path(&self) -> PathBuf {
        sketch_path(&self.dir, &self.name)
    }

    pub fn sketch(&self) -> &Sketch {
        &self.sketch
    }

    pub fn sketch_mut(&mut self) -> &mut Sketch {
        &mut self.sketch
    }

    /// Write the composed sketch to the project's `.ino` file
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.sketch_path();
        self.sketch.export(&path)?;
        Ok(path)
    }

    /// Keep the output of the last `op` (`compile`, `upload`) under `logs/`
    pub fn save_log(&self, op: &str, log: &str) -> Result<PathBuf> {
        let dir = self.dir.join("logs");
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(format!("{op}.log"));
        std::fs::write(&path, log).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

fn sketch_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.ino"))
}

/// Project names become directory and file names
fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Project name must not be empty");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        bail!("Invalid project name '{name}'. Use letters, digits, '_' and '-'");
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_model::Section;

    #[test]
    fn test_init_save_load() {
        let root = tempfile::tempdir().unwrap();

        let mut project = Project::init(root.path(), "blink").unwrap();
        assert!(root.path().join("blink/blink.ino").is_file());

        project.sketch_mut().set(Section::Setup, "pinMode(13, OUTPUT);", true);
        project.save().unwrap();

        let loaded = Project::load(root.path(), "blink").unwrap();
        assert_eq!(loaded.sketch().section(Section::Setup), ["pinMode(13, OUTPUT);"]);
        assert_eq!(loaded.sketch().compose(), project.sketch().compose());
    }

    #[test]
    fn test_init_refuses_existing_project() {
        let root = tempfile::tempdir().unwrap();
        Project::init(root.path(), "blink").unwrap();
        let err = Project::init(root.path(), "blink").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_load_missing_project() {
        let root = tempfile::tempdir().unwrap();
        assert!(Project::load(root.path(), "nope").is_err());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let root = tempfile::tempdir().unwrap();
        assert!(Project::init(root.path(), "../escape").is_err());
        assert!(Project::init(root.path(), "  ").is_err());
    }

    #[test]
    fn test_save_log() {
        let root = tempfile::tempdir().unwrap();
        let project = Project::init(root.path(), "blink").unwrap();
        let path = project.save_log("compile", "Sketch uses 924 bytes").unwrap();
        assert_eq!(path, root.path().join("blink/logs/compile.log"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Sketch uses 924 bytes");
    }
}
