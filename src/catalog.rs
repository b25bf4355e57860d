//! Catalog locator
//!
//! The engine enumerates candidate catalog locations; the host token from the
//! request URI names the catalog file expected inside one of them. The first
//! candidate that actually contains the file wins. Enumeration order is
//! defined by the engine, not by us, so ties resolve to first-found.

use crate::error::{HandlerError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A located catalog configuration resource.
///
/// Resolved once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRef {
    path: PathBuf,
}

impl CatalogRef {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Find the catalog named `host` among the candidate locations.
///
/// Returns the first match in enumeration order; no match is fatal for the
/// handler (exit 1).
pub fn locate(candidates: &[String], host: &str) -> Result<CatalogRef> {
    for candidate in candidates {
        let path = Path::new(candidate).join(host);
        if path.is_file() {
            debug!(catalog = %path.display(), "located catalog");
            return Ok(CatalogRef { path });
        }
    }
    Err(HandlerError::catalog(format!(
        "couldn't find a catalog for {host:?} in {} candidate location(s)",
        candidates.len()
    )))
}
