use clap::Args;

use crate::commands::target::ToolchainArgs;

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "SB_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on; the next free port is used when it is taken
    #[arg(long, env = "SB_PORT", default_value_t = 5000)]
    pub port: u16,

    /// API token clients must send (generated when omitted)
    #[arg(long, env = "SB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(flatten)]
    pub toolchain: ToolchainArgs,
}
