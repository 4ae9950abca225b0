//! crates/acrostic_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the relational store, the auth provider and the
//! versification table.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Branch, BranchFilter, BranchUpdate, Identity, NewBranch, Testament, VoteValue, VotedBranch,
};
use crate::structure::BookInfo;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait BranchStore: Send + Sync {
    /// Persists a new branch. Ids and timestamps are assigned by the store.
    async fn insert_branch(&self, branch: NewBranch) -> PortResult<Branch>;

    async fn get_branch(&self, branch_id: Uuid) -> PortResult<Branch>;

    /// Returns matching branches with their vote rows attached, oldest first
    /// (`created_at`, then `id`).
    async fn find_branches(&self, filter: BranchFilter) -> PortResult<Vec<VotedBranch>>;

    async fn update_branch(&self, branch_id: Uuid, update: BranchUpdate) -> PortResult<Branch>;

    /// Sets the canonical flag. Setting it clears the flag on every other branch
    /// at the same reference, atomically.
    async fn set_canonical(&self, branch_id: Uuid, is_canonical: bool) -> PortResult<Branch>;
}

#[async_trait]
pub trait VoteStore: Send + Sync {
    /// Inserts or replaces the caller's vote on a branch.
    async fn upsert_vote(&self, user_id: Uuid, branch_id: Uuid, value: VoteValue)
        -> PortResult<()>;

    /// Retracts the caller's vote. Retracting a missing vote is not an error.
    async fn delete_vote(&self, user_id: Uuid, branch_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolves an auth session id (issued by the external auth provider) to the caller.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity>;
}

/// Read-only lookup over the shape of the canon.
pub trait StructureLookup: Send + Sync {
    fn book(&self, code: &str) -> Option<&BookInfo>;

    /// Books of one testament, in canonical order.
    fn books(&self, testament: Testament) -> Vec<&BookInfo>;

    /// Verse count of a 1-based chapter; 0 for unknown books or chapters.
    fn chapter_verse_count(&self, code: &str, chapter: usize) -> usize {
        self.book(code).map_or(0, |b| b.verse_count(chapter))
    }

    /// 1-based position of a book within its own testament.
    fn book_position(&self, code: &str) -> Option<usize> {
        let book = self.book(code)?;
        self.books(book.testament)
            .iter()
            .position(|b| b.code == book.code)
            .map(|i| i + 1)
    }
}
