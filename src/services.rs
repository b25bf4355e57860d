//! Collaborator contracts
//!
//! The catalog/search/install engines, the package daemon and the desktop
//! notification service all live outside this crate. The handlers talk to
//! them through these narrow traits; responses come back asynchronously as
//! events on the process event loop (see [`crate::events`]).
//!
//! Keeping the seams here means the orchestration logic never knows whether
//! it is driving a production bridge process or a test double.

use crate::catalog::CatalogRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::Display;

/// Lifecycle status of an installable entry, owned by the catalog engine.
///
/// The orchestrator never mutates entries; it issues install commands and
/// observes status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntryStatus {
    Invalid,
    Downloadable,
    Installed,
    Updateable,
    Deleted,
    Installing,
    Updating,
}

/// Read-only view of an installable content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    /// Provider identity, usually a URL; compared by host against the
    /// provider id named in the request URI.
    pub provider_id: String,
    pub status: EntryStatus,
}

/// An exact-id search request issued once providers are loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub entry_id: String,
    /// Newest-first ordering, so a stale mirror cannot shadow the current
    /// revision of the entry.
    pub newest_first: bool,
}

impl SearchQuery {
    pub fn exact(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            newest_first: true,
        }
    }
}

/// Identifies one prompt shown through the notification sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptId(pub u64);

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prompt#{}", self.0)
    }
}

/// An AppStream component with the distribution packages that provide it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(default)]
    pub package_names: Vec<String>,
}

/// The content-provider catalog engine (config enumeration, entry search,
/// install transactions).
pub trait CatalogEngine {
    /// Candidate catalog locations, in engine-defined order.
    fn config_locations(&self) -> Vec<String>;

    /// Initialize the engine with the located catalog. Returns false when the
    /// catalog cannot be loaded; the handler treats that as fatal.
    fn init(&mut self, catalog: &CatalogRef) -> bool;

    /// Start an asynchronous entry search. Results arrive as
    /// [`crate::events::EngineEvent::EntriesFound`] batches followed by
    /// [`crate::events::EngineEvent::SearchFinished`].
    fn search(&mut self, query: &SearchQuery);

    /// Start an install transaction for one entry. Status transitions arrive
    /// as [`crate::events::EngineEvent::EntryStatusChanged`] events.
    fn install(&mut self, entry: &Entry, link_id: i32);
}

/// The AppStream component pool.
pub trait PackagePool {
    /// Load the pool metadata. Returns false when the catalog cannot be read.
    fn load(&mut self) -> bool;

    /// All components registered under the given component id.
    fn components_by_id(&self, component_id: &str) -> Vec<Component>;
}

/// The package daemon used to turn package names into installable ids and
/// drive the install transaction.
pub trait PackageBackend {
    /// Resolve package names to concrete package ids; results arrive as
    /// [`crate::events::PackageEvent::Resolved`] events followed by
    /// [`crate::events::PackageEvent::ResolveFinished`].
    fn resolve(&mut self, names: &[String]);

    /// Install the given package ids; completion arrives as
    /// [`crate::events::PackageEvent::InstallFinished`].
    fn install(&mut self, package_ids: &[String]);
}

/// Presents a user-visible prompt with a fixed set of actions.
///
/// Prompt outcomes arrive asynchronously as `PromptAction`/`PromptClosed`
/// events carrying the returned [`PromptId`]; the caller never blocks.
pub trait NotificationSink {
    fn present(&mut self, title: &str, body: &str, actions: &[&str]) -> PromptId;
}
