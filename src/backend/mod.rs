//! Production wiring of the collaborator contracts
//!
//! The real engines run out of process; these adapters connect the service
//! traits to them. See [`bridge`] for the NDJSON engine bridge and [`notify`]
//! for the desktop prompt adapter.

pub mod bridge;
pub mod notify;

pub use bridge::{BridgeEngine, BridgeQuestionBus, PackageBridge, resolve_bridge};
pub use notify::DesktopNotifier;
