//! Event payloads carried on the process event loop
//!
//! Each handler runs a single `mpsc` receiver; every collaborator callback
//! becomes one of these messages. The serde shape doubles as the NDJSON wire
//! format of the engine bridge (see [`crate::backend::bridge`]), one tagged
//! object per line.

use crate::question::Question;
use crate::services::{Entry, PromptId};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Error classes reported by the catalog/search/install engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EngineErrorCode {
    Unknown,
    Network,
    Ocs,
    ConfigFile,
    Provider,
    Installation,
    Image,
    Adoption,
    TryAgainLater,
}

/// Events dispatched to the entry-install orchestrator and question relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine finished loading the catalog's providers.
    ProvidersLoaded,
    /// A batch of search results.
    EntriesFound { entries: Vec<Entry> },
    /// The search result stream completed.
    SearchFinished,
    /// An entry tracked by an install transaction changed status.
    EntryStatusChanged { entry: Entry },
    /// An asynchronous engine error; always fatal to the handler.
    ErrorCode {
        code: EngineErrorCode,
        message: String,
        #[serde(default)]
        metadata: serde_json::Value,
    },
    /// The engine raised an interactive question.
    QuestionAsked { question: Question },
    /// The user picked an action on a prompt.
    PromptAction { prompt: PromptId, action: usize },
    /// A prompt was dismissed without a choice.
    PromptClosed { prompt: PromptId },
}

/// Events dispatched to the package resolve/install flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PackageEvent {
    /// One package name resolved against the distribution repositories.
    Resolved {
        name: String,
        package_id: String,
        /// False for packages that are already installed or unavailable for
        /// the current architecture.
        available: bool,
    },
    /// The resolve transaction finished.
    ResolveFinished { ok: bool },
    /// The install transaction finished.
    InstallFinished { ok: bool },
}
