use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sb_server::RelayServer;

use super::args::ServeArgs;
use crate::config::{credential, system_session};
use crate::messages::print_success;
use crate::server;

/// Run the relay until Ctrl-C
pub fn handle_serve(args: ServeArgs) -> Result<()> {
    let session = system_session(&args.toolchain.config());
    let relay = Arc::new(RelayServer::new(session, credential(args.token.as_deref())));

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(&args, relay));
    // A running upload or listen must not hold up exit
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run(args: &ServeArgs, relay: Arc<RelayServer>) -> Result<()> {
    let listener = server::bind(&args.host, args.port)
        .await
        .with_context(|| format!("Failed to listen on {}:{}", args.host, args.port))?;
    let addr = listener.local_addr()?;
    log::info!("Relay listening on {addr}");

    let url = format!("ws://{addr}");
    let token = relay.credential().token().to_string();
    let connect = format!("sb console --remote {url} --token {token}");
    print_success(
        &format!("Relay listening on {url}\n  Token: {token}"),
        &[connect.as_str(), "Press Ctrl-C to stop"],
    );

    tokio::select! {
        result = server::serve(listener, relay) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to wait for Ctrl-C")?;
            log::info!("Shutting down relay");
            Ok(())
        }
    }
}
