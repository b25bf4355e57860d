//! `appstream://` URL handler
//!
//! Invoked by the desktop shell with a single component URI such as
//! `appstream://org.example.App`. Maps the component to distribution
//! packages through the package bridge, resolves them and installs whatever
//! is available. Exit code 0 means installed or nothing to do; 1 means the
//! component was not found or the resolve/install failed.

use clap::Parser;
use content_handlers::appstream::PackageFlow;
use content_handlers::backend::{PackageBridge, resolve_bridge};
use content_handlers::logging;
use content_handlers::uri::{RequestUri, Scheme};
use std::sync::mpsc;
use tracing::error;

const PACKAGE_BRIDGE: &str = "packagekit-bridge";

/// Install the packages providing an AppStream component
#[derive(Parser)]
#[command(name = "appstream-handler")]
#[command(about = "Resolves an appstream:// URI and installs the providing packages")]
#[command(version)]
struct Cli {
    /// The appstream:// URI to open
    uri: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let code = run(&cli.uri).unwrap_or_else(|err| {
        error!("{err:#}");
        1
    });
    std::process::exit(code);
}

fn run(raw: &str) -> anyhow::Result<i32> {
    let uri = RequestUri::parse(raw)?;
    uri.assert_scheme(Scheme::AppStream);

    let (events, loop_rx) = mpsc::channel();
    let bridge = resolve_bridge(PACKAGE_BRIDGE)?;
    let service = PackageBridge::new(bridge, events);

    let mut flow = PackageFlow::new(service, uri.host);
    flow.start();
    Ok(flow.run(loop_rx))
}
