//! `kns://` URL handler
//!
//! Invoked by the desktop shell with a single content-provider URI such as
//! `kns://sddmtheme.knsrc/api.kde-look.org/1234?linkid=2`. Locates the named
//! catalog, resolves the entry through the engine bridge and drives the
//! install to completion. Exit code 0 means installed or nothing to do;
//! 1 means any validation, resolution or engine failure.

use anyhow::Context;
use clap::Parser;
use content_handlers::backend::{BridgeEngine, DesktopNotifier, resolve_bridge};
use content_handlers::orchestrator::{InstallRequest, Orchestrator};
use content_handlers::question::QuestionRelay;
use content_handlers::services::CatalogEngine;
use content_handlers::uri::{KnsRequest, RequestUri, Scheme};
use content_handlers::{catalog, logging};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::{debug, error};

const ENGINE_BRIDGE: &str = "kns-engine-bridge";

/// Install content-provider entries from kns:// URIs
#[derive(Parser)]
#[command(name = "kns-handler")]
#[command(about = "Resolves a kns:// URI and installs the referenced entry")]
#[command(version)]
struct Cli {
    /// The kns:// URI to open
    uri: String,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    migrate_window_decoration_registry();

    let code = run(&cli.uri).unwrap_or_else(|err| {
        error!("{err:#}");
        1
    });
    std::process::exit(code);
}

fn run(raw: &str) -> anyhow::Result<i32> {
    let uri = RequestUri::parse(raw)?;
    uri.assert_scheme(Scheme::Kns);
    let request = KnsRequest::from_uri(&uri)?;

    let (events, loop_rx) = mpsc::channel();
    let bridge = resolve_bridge(ENGINE_BRIDGE)?;
    let engine = BridgeEngine::new(bridge, events.clone());

    let catalog = catalog::locate(&engine.config_locations(), &request.catalog)
        .with_context(|| format!("resolving catalog for {}", request.catalog))?;

    let relay = QuestionRelay::new(engine.question_bus(), DesktopNotifier::new(events));
    let mut orchestrator = Orchestrator::new(engine, relay, InstallRequest::from(request));
    orchestrator.start(&catalog);
    Ok(orchestrator.run(loop_rx))
}

/// Link the legacy window-decoration registry name to the current one.
///
/// Two catalog names exist for window decorations but only one is exposed in
/// the settings UI; without the link, entries installed as a dependency of a
/// global theme cannot be removed there. Best-effort and silent: a failed
/// migration must never block an install.
#[cfg(unix)]
fn migrate_window_decoration_registry() {
    let Some(data_dir) = user_data_dir() else {
        return;
    };
    let base = data_dir.join("knewstuff3");
    let legacy = base.join("aurorae.knsregistry");
    if legacy.is_symlink() {
        return;
    }
    if legacy.exists() {
        let _ = std::fs::remove_file(&legacy);
    }
    let current = base.join("window-decorations.knsregistry");
    if !current.exists() {
        if std::fs::create_dir_all(&base).is_err() {
            return;
        }
        let _ = std::fs::File::create(&current);
    }
    if std::os::unix::fs::symlink(&current, &legacy).is_ok() {
        debug!(from = %legacy.display(), to = %current.display(), "linked legacy registry");
    }
}

#[cfg(not(unix))]
fn migrate_window_decoration_registry() {}

#[cfg(unix)]
fn user_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_DATA_HOME") {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir));
        }
    }
    std::env::var("HOME")
        .ok()
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(".local/share"))
}
