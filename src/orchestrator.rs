//! Resolution and install orchestration
//!
//! This module is the authoritative state machine behind the `kns-handler`
//! binary: locate the catalog, wait for providers, search for the requested
//! entry, verify its provider identity, drive the install transaction and
//! account for completion.
//!
//! # Design principles
//!
//! - **Single source of truth**: the [`Orchestrator`] owns the current state,
//!   the in-flight counter and the outcome.
//! - **First terminal event wins**: once an outcome is set, every further
//!   event is a no-op. Event arrival order between independent events is
//!   engine-defined and must not be relied upon.
//! - **Fail fast**: every failure path is terminal for the process; the
//!   invoking shell owns any retry policy.
//!
//! # State flow
//!
//! ```text
//! Init
//!     ↓ engine.init(catalog)
//! ProvidersLoading
//!     ↓ providers loaded → exact-id search
//! Searching
//!     ↓ entry found / stream finished empty
//! EntryFound ──────────────→ EntryNotFound (fatal)
//!     ↓ downloadable → install      ↓
//! Installing                     Done(1)
//!     ↓ status → installed, counter hits zero
//! Done(0)
//!
//! (Any engine error event is fatal from any state)
//! ```

use crate::catalog::CatalogRef;
use crate::events::EngineEvent;
use crate::question::{QuestionBus, QuestionRelay};
use crate::services::{CatalogEngine, Entry, EntryStatus, NotificationSink, SearchQuery};
use std::sync::mpsc::Receiver;
use strum::Display;
use tracing::{debug, error, info, warn};
use url::Url;

/// Orchestration states, in the order they are normally entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum HandlerState {
    /// Engine not initialized yet
    Init,
    /// Catalog accepted, waiting for the providers-loaded event
    ProvidersLoading,
    /// Exact-id search issued, waiting for results
    Searching,
    /// The requested entry was observed in the result stream
    EntryFound,
    /// The result stream finished without the entry (terminal)
    EntryNotFound,
    /// At least one install transaction is in flight
    Installing,
    /// Terminal; the outcome determines the exit code
    Done,
}

/// Terminal outcome of a handler run, mapped to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Outcome {
    /// Every issued install transaction completed
    #[strum(serialize = "installed")]
    Installed,
    /// The entry needed no install (already installed)
    #[strum(serialize = "nothing to do")]
    NothingToDo,
    /// Validation, resolution, identity or engine failure
    #[strum(serialize = "failed")]
    Failed,
}

impl Outcome {
    /// POSIX-style exit code: 0 for success (including nothing-to-do),
    /// 1 for every failure class.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Installed | Outcome::NothingToDo => 0,
            Outcome::Failed => 1,
        }
    }
}

/// The validated request the orchestrator works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub provider_id: String,
    pub entry_id: String,
    pub link_id: i32,
}

impl From<crate::uri::KnsRequest> for InstallRequest {
    fn from(request: crate::uri::KnsRequest) -> Self {
        Self {
            provider_id: request.provider_id,
            entry_id: request.entry_id,
            link_id: request.link_id,
        }
    }
}

/// Entry-install state machine.
///
/// Owns the engine and the question relay; both are driven exclusively from
/// loop-dispatched events, so no synchronization is needed.
pub struct Orchestrator<E, B, N>
where
    E: CatalogEngine,
    B: QuestionBus,
    N: NotificationSink,
{
    engine: E,
    relay: QuestionRelay<B, N>,
    request: InstallRequest,
    state: HandlerState,
    /// +1 per issued install, -1 per status transition to Installed.
    in_flight: u32,
    entry_seen: bool,
    outcome: Option<Outcome>,
}

impl<E, B, N> Orchestrator<E, B, N>
where
    E: CatalogEngine,
    B: QuestionBus,
    N: NotificationSink,
{
    pub fn new(engine: E, relay: QuestionRelay<B, N>, request: InstallRequest) -> Self {
        Self {
            engine,
            relay,
            request,
            state: HandlerState::Init,
            in_flight: 0,
            entry_seen: false,
            outcome: None,
        }
    }

    /// Current state, for observation in tests and logs.
    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Terminal outcome, if one has been reached.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Number of install transactions issued but not yet completed.
    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    /// Initialize the engine with the located catalog.
    ///
    /// Failure here is terminal; `run` will return immediately afterwards.
    pub fn start(&mut self, catalog: &CatalogRef) {
        debug_assert_eq!(self.state, HandlerState::Init);
        if self.engine.init(catalog) {
            self.state = HandlerState::ProvidersLoading;
        } else {
            error!(catalog = %catalog.path().display(), "couldn't initialize the engine");
            self.fail();
        }
    }

    /// Dispatch one loop event. No-op once a terminal outcome is set.
    pub fn handle(&mut self, event: EngineEvent) {
        if self.outcome.is_some() {
            debug!(?event, "event after terminal outcome ignored");
            return;
        }
        match event {
            EngineEvent::ProvidersLoaded => self.on_providers_loaded(),
            EngineEvent::EntriesFound { entries } => self.on_entries_found(entries),
            EngineEvent::SearchFinished => self.on_search_finished(),
            EngineEvent::EntryStatusChanged { entry } => self.on_status_changed(entry),
            EngineEvent::ErrorCode {
                code,
                message,
                metadata,
            } => {
                let err = crate::error::HandlerError::Engine {
                    code,
                    message,
                    metadata,
                };
                error!(%err, "engine error");
                self.fail();
            }
            EngineEvent::QuestionAsked { question } => self.relay.handle_question(question),
            EngineEvent::PromptAction { prompt, action } => {
                self.relay.handle_prompt_action(prompt, action);
            }
            EngineEvent::PromptClosed { prompt } => self.relay.handle_prompt_closed(prompt),
        }
    }

    /// Drain the event loop until a terminal outcome is reached and return
    /// the process exit code.
    pub fn run(&mut self, events: Receiver<EngineEvent>) -> i32 {
        while self.outcome.is_none() {
            match events.recv() {
                Ok(event) => self.handle(event),
                Err(_) => {
                    warn!("event channel closed before a terminal outcome");
                    self.fail();
                }
            }
        }
        // Checked by the loop condition
        let outcome = self.outcome.unwrap_or(Outcome::Failed);
        info!(%outcome, "handler finished");
        outcome.exit_code()
    }

    fn on_providers_loaded(&mut self) {
        if self.state != HandlerState::ProvidersLoading {
            debug!(state = %self.state, "unexpected providers-loaded event ignored");
            return;
        }
        self.state = HandlerState::Searching;
        let query = SearchQuery::exact(self.request.entry_id.clone());
        self.engine.search(&query);
    }

    fn on_entries_found(&mut self, entries: Vec<Entry>) {
        if !matches!(self.state, HandlerState::Searching) {
            debug!(state = %self.state, "unexpected search results ignored");
            return;
        }
        for entry in entries {
            if entry.id != self.request.entry_id {
                debug!(entry = %entry.id, "result outside the exact-id scope ignored");
                continue;
            }
            if self.entry_seen {
                // Exact-id search is contractually a single match; more than
                // one is an engine bug. Keep the first and carry on.
                warn!(entry = %entry.id, "engine returned more than one match for an exact id");
                continue;
            }
            self.entry_seen = true;
            self.state = HandlerState::EntryFound;
            self.on_entry_found(entry);
            if self.outcome.is_some() {
                return;
            }
        }
    }

    fn on_entry_found(&mut self, entry: Entry) {
        let provider_host = provider_host(&entry.provider_id);
        if provider_host != self.request.provider_id {
            warn!(
                expected = %self.request.provider_id,
                resolved = %provider_host,
                "wrong provider for the resolved entry"
            );
            self.fail();
            return;
        }
        if entry.status == EntryStatus::Downloadable {
            info!(entry = %entry.id, link_id = self.request.link_id, "installing");
            self.in_flight += 1;
            self.state = HandlerState::Installing;
            self.engine.install(&entry, self.request.link_id);
        } else if self.in_flight == 0 {
            info!(entry = %entry.id, status = %entry.status, "already installed, nothing to do");
            self.finish(Outcome::NothingToDo);
        }
    }

    fn on_search_finished(&mut self) {
        match self.state {
            HandlerState::Searching => {
                if !self.entry_seen {
                    warn!(entry = %self.request.entry_id, "entry not found");
                    self.state = HandlerState::EntryNotFound;
                    self.fail();
                }
            }
            HandlerState::EntryFound | HandlerState::Installing => {
                // Stream completion after the entry was handled carries no
                // further information.
            }
            _ => debug!(state = %self.state, "unexpected search-finished event ignored"),
        }
    }

    fn on_status_changed(&mut self, entry: Entry) {
        if self.state != HandlerState::Installing {
            debug!(state = %self.state, "status change outside install ignored");
            return;
        }
        if entry.status == EntryStatus::Installed {
            self.in_flight = self.in_flight.saturating_sub(1);
            debug!(entry = %entry.id, in_flight = self.in_flight, "install completed");
            if self.in_flight == 0 {
                self.finish(Outcome::Installed);
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) {
        self.state = HandlerState::Done;
        self.outcome = Some(outcome);
    }

    fn fail(&mut self) {
        self.finish(Outcome::Failed);
    }
}

/// The provider identity carried by an entry is usually a URL; the request
/// URI names only its host. Fall back to the raw string for bare ids.
fn provider_host(provider_id: &str) -> String {
    Url::parse(provider_id)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| provider_id.to_string())
}
