//! Desktop URL handlers for installable content
//!
//! This library backs two small executables invoked by the desktop shell:
//! `kns-handler` resolves `kns://` content-provider URIs and drives a single
//! entry install to completion; `appstream-handler` resolves
//! `appstream://` component URIs into distribution packages and installs
//! them. The process exit code is the only machine-readable result: 0 for
//! success (including nothing to do), 1 for any failure.

pub mod appstream;
pub mod backend;
pub mod catalog;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestrator;
pub mod question;
pub mod services;
pub mod uri;

// Re-export main types for convenience
pub use appstream::{FlowState, PackageFlow};
pub use backend::{BridgeEngine, BridgeQuestionBus, DesktopNotifier, PackageBridge, resolve_bridge};
pub use catalog::CatalogRef;
pub use error::{HandlerError, Result};
pub use events::{EngineErrorCode, EngineEvent, PackageEvent};
pub use orchestrator::{HandlerState, InstallRequest, Orchestrator, Outcome};
pub use question::{Question, QuestionBus, QuestionId, QuestionKind, QuestionRelay, QuestionResponse};
pub use services::{
    CatalogEngine, Component, Entry, EntryStatus, NotificationSink, PackageBackend, PackagePool,
    PromptId, SearchQuery,
};
pub use uri::{KnsRequest, RequestUri, Scheme, UriError};
