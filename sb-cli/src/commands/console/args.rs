use std::path::PathBuf;

use clap::Args;

use crate::commands::target::TargetArgs;
use crate::project::DEFAULT_PROJECTS_DIR;

#[derive(Debug, Clone, Args)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory holding project folders
    #[arg(long, env = "SB_PROJECTS_DIR", default_value = DEFAULT_PROJECTS_DIR)]
    pub projects_dir: PathBuf,

    /// Run the commands in this file instead of prompting; stops at the first error
    #[arg(long)]
    pub script: Option<PathBuf>,
}
