//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler.

use acrostic_core::ports::{BranchStore, IdentityStore, StructureLookup, VoteStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub branches: Arc<dyn BranchStore>,
    pub votes: Arc<dyn VoteStore>,
    pub identities: Arc<dyn IdentityStore>,
    pub structure: Arc<dyn StructureLookup>,
    /// Stamped into the `meta.version` field of compiled exports.
    pub export_version: String,
}
