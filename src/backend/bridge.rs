//! NDJSON engine bridge
//!
//! The catalog and package engines are separate processes. A bridge helper is
//! spawned per handler run and spoken to over stdio: commands go in as one
//! JSON object per stdin line, events come out as one JSON object per stdout
//! line (the serde shapes in [`crate::events`]). A reader thread forwards
//! every event onto the handler's event loop; stderr is inherited so engine
//! diagnostics land next to ours.
//!
//! Helper discovery order: the `CONTENT_HANDLERS_BRIDGE_DIR` environment
//! override, then `PATH`.

use crate::catalog::CatalogRef;
use crate::error::{HandlerError, Result};
use crate::events::{EngineErrorCode, EngineEvent, PackageEvent};
use crate::question::{QuestionBus, QuestionId, QuestionResponse};
use crate::services::{CatalogEngine, Component, Entry, PackageBackend, PackagePool, SearchQuery};
use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::env;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, warn};

/// Environment override for the bridge helper directory.
pub const ENV_BRIDGE_DIR: &str = "CONTENT_HANDLERS_BRIDGE_DIR";

/// Locate a bridge helper binary by name.
///
/// Checks the `CONTENT_HANDLERS_BRIDGE_DIR` override first, then every `PATH`
/// entry.
pub fn resolve_bridge(name: &str) -> Result<PathBuf> {
    if let Ok(dir) = env::var(ENV_BRIDGE_DIR) {
        let candidate = Path::new(&dir).join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    if let Some(paths) = env::var_os("PATH") {
        for dir in env::split_paths(&paths) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(HandlerError::bridge(format!(
        "unable to locate engine bridge '{name}'; set {ENV_BRIDGE_DIR} or install it on PATH"
    )))
}

/// Shared handle to the bridge's stdin; present only while the bridge runs.
#[derive(Clone)]
struct SharedStdin(Arc<Mutex<Option<ChildStdin>>>);

impl SharedStdin {
    fn empty() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    fn attach(&self, stdin: ChildStdin) {
        if let Ok(mut guard) = self.0.lock() {
            *guard = Some(stdin);
        }
    }

    /// Write one command as a JSON line. Errors are surfaced to the caller;
    /// a dead bridge also ends the event stream, which the state machines
    /// treat as fatal.
    fn send(&self, command: &impl Serialize) -> anyhow::Result<()> {
        let line = serde_json::to_string(command).context("serializing bridge command")?;
        let mut guard = self
            .0
            .lock()
            .map_err(|_| anyhow::anyhow!("bridge stdin lock poisoned"))?;
        let stdin = guard
            .as_mut()
            .context("bridge not running; command dropped")?;
        writeln!(stdin, "{line}").context("writing to bridge stdin")?;
        stdin.flush().context("flushing bridge stdin")?;
        Ok(())
    }
}

/// Forward NDJSON events from the bridge stdout onto the event loop.
///
/// Unparseable lines are logged and skipped. When the stream ends,
/// `eof_event` (if any) is delivered so a crashed bridge cannot leave the
/// handler waiting forever; dropping the sender afterwards lets loops that
/// watch for disconnection notice as well.
fn forward_events<T>(stdout: ChildStdout, events: Sender<T>, eof_event: Option<T>)
where
    T: DeserializeOwned + Send + 'static,
{
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(%err, "error reading bridge stdout");
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(trimmed) {
                Ok(event) => {
                    if events.send(event).is_err() {
                        // The loop is gone; the handler is exiting.
                        return;
                    }
                }
                Err(err) => warn!(%err, line = trimmed, "skipping malformed bridge event"),
            }
        }
        debug!("bridge event stream ended");
        if let Some(event) = eof_event {
            let _ = events.send(event);
        }
    });
}

fn spawn_bridge(program: &Path, args: &[&str]) -> anyhow::Result<(Child, ChildStdout, ChildStdin)> {
    debug!(program = %program.display(), ?args, "spawning engine bridge");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to spawn bridge {}", program.display()))?;
    let stdout = child
        .stdout
        .take()
        .context("bridge stdout not captured")?;
    let stdin = child.stdin.take().context("bridge stdin not captured")?;
    Ok((child, stdout, stdin))
}

/// Run a short-lived bridge invocation and return its stdout lines.
fn one_shot_lines(program: &Path, args: &[&str]) -> anyhow::Result<Vec<String>> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("failed to run bridge {}", program.display()))?;
    if !output.status.success() {
        anyhow::bail!("bridge {:?} exited with {}", args, output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum EngineCommand<'a> {
    Search { query: &'a SearchQuery },
    Install { entry: &'a Entry, link_id: i32 },
    SetResponse {
        question: QuestionId,
        response: QuestionResponse,
    },
}

#[derive(Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum PackageCommand<'a> {
    Resolve { names: &'a [String] },
    Install { package_ids: &'a [String] },
}

/// [`CatalogEngine`] backed by a content-provider bridge process.
pub struct BridgeEngine {
    program: PathBuf,
    events: Option<Sender<EngineEvent>>,
    stdin: SharedStdin,
    child: Option<Child>,
}

impl BridgeEngine {
    pub fn new(program: PathBuf, events: Sender<EngineEvent>) -> Self {
        Self {
            program,
            events: Some(events),
            stdin: SharedStdin::empty(),
            child: None,
        }
    }

    /// A response channel for the question relay, valid for the lifetime of
    /// the bridge process.
    pub fn question_bus(&self) -> BridgeQuestionBus {
        BridgeQuestionBus {
            stdin: self.stdin.clone(),
        }
    }

    fn send(&self, command: &EngineCommand<'_>) {
        if let Err(err) = self.stdin.send(command) {
            // The dead bridge ends the event stream, which surfaces as a
            // fatal engine error on the loop.
            warn!(%err, "failed to send engine command");
        }
    }
}

impl CatalogEngine for BridgeEngine {
    fn config_locations(&self) -> Vec<String> {
        match one_shot_lines(&self.program, &["list-config-locations"]) {
            Ok(lines) => lines,
            Err(err) => {
                warn!(%err, "couldn't enumerate catalog locations");
                Vec::new()
            }
        }
    }

    fn init(&mut self, catalog: &CatalogRef) -> bool {
        let Some(events) = self.events.take() else {
            error!("engine bridge already initialized");
            return false;
        };
        let config = catalog.path().display().to_string();
        match spawn_bridge(&self.program, &["serve", "--config", &config]) {
            Ok((child, stdout, stdin)) => {
                self.stdin.attach(stdin);
                self.child = Some(child);
                forward_events(
                    stdout,
                    events,
                    Some(EngineEvent::ErrorCode {
                        code: EngineErrorCode::Unknown,
                        message: "engine bridge closed its event stream".into(),
                        metadata: serde_json::Value::Null,
                    }),
                );
                true
            }
            Err(err) => {
                error!(%err, "couldn't start the engine bridge");
                false
            }
        }
    }

    fn search(&mut self, query: &SearchQuery) {
        self.send(&EngineCommand::Search { query });
    }

    fn install(&mut self, entry: &Entry, link_id: i32) {
        self.send(&EngineCommand::Install { entry, link_id });
    }
}

impl Drop for BridgeEngine {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Delivers question responses through the engine bridge stdin.
pub struct BridgeQuestionBus {
    stdin: SharedStdin,
}

impl QuestionBus for BridgeQuestionBus {
    fn set_response(&mut self, question: QuestionId, response: QuestionResponse) {
        if let Err(err) = self.stdin.send(&EngineCommand::SetResponse { question, response }) {
            warn!(%err, question = question.0, "failed to deliver question response");
        }
    }
}

/// [`PackagePool`] + [`PackageBackend`] backed by a package-daemon bridge.
pub struct PackageBridge {
    program: PathBuf,
    events: Option<Sender<PackageEvent>>,
    stdin: SharedStdin,
    child: Option<Child>,
}

impl PackageBridge {
    pub fn new(program: PathBuf, events: Sender<PackageEvent>) -> Self {
        Self {
            program,
            events: Some(events),
            stdin: SharedStdin::empty(),
            child: None,
        }
    }

    fn send(&self, command: &PackageCommand<'_>) {
        if let Err(err) = self.stdin.send(command) {
            warn!(%err, "failed to send package command");
        }
    }
}

impl PackagePool for PackageBridge {
    fn load(&mut self) -> bool {
        let Some(events) = self.events.take() else {
            error!("package bridge already loaded");
            return false;
        };
        match spawn_bridge(&self.program, &["serve"]) {
            Ok((child, stdout, stdin)) => {
                self.stdin.attach(stdin);
                self.child = Some(child);
                // No synthetic EOF event: the flow observes the channel
                // disconnecting once the reader thread exits.
                forward_events(stdout, events, None);
                true
            }
            Err(err) => {
                error!(%err, "couldn't start the package bridge");
                false
            }
        }
    }

    fn components_by_id(&self, component_id: &str) -> Vec<Component> {
        let lines = match one_shot_lines(&self.program, &["components", component_id]) {
            Ok(lines) => lines,
            Err(err) => {
                warn!(%err, component = component_id, "component lookup failed");
                return Vec::new();
            }
        };
        let mut components = Vec::new();
        for line in lines {
            match serde_json::from_str::<Component>(&line) {
                Ok(component) => components.push(component),
                Err(err) => warn!(%err, line, "skipping malformed component record"),
            }
        }
        components
    }
}

impl PackageBackend for PackageBridge {
    fn resolve(&mut self, names: &[String]) {
        self.send(&PackageCommand::Resolve { names });
    }

    fn install(&mut self, package_ids: &[String]) {
        self.send(&PackageCommand::Install { package_ids });
    }
}

impl Drop for PackageBridge {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
