//! crates/acrostic_core/src/memory.rs
//!
//! A process-local implementation of the storage and identity ports.
//! Used by the test suites and by the seed binary's dry run.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    Branch, BranchFilter, BranchStatus, BranchUpdate, Identity, NewBranch, Vote, VoteValue,
    VotedBranch,
};
use crate::ports::{BranchStore, IdentityStore, PortError, PortResult, VoteStore};

#[derive(Default)]
struct Inner {
    // Insertion order doubles as creation order.
    branches: Vec<Branch>,
    votes: Vec<Vote>,
    sessions: HashMap<String, Identity>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session id that `validate_auth_session` will accept.
    pub fn add_session(&self, session_id: &str, identity: Identity) -> PortResult<()> {
        self.lock()?
            .sessions
            .insert(session_id.to_string(), identity);
        Ok(())
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| PortError::Unexpected(format!("store lock poisoned: {}", e)))
    }
}

fn not_found(branch_id: Uuid) -> PortError {
    PortError::NotFound(format!("Branch {} not found", branch_id))
}

#[async_trait]
impl BranchStore for InMemoryStore {
    async fn insert_branch(&self, branch: NewBranch) -> PortResult<Branch> {
        let branch = Branch {
            id: Uuid::new_v4(),
            level: branch.level,
            reference: branch.reference,
            parent_branch_id: branch.parent_branch_id,
            content: branch.content,
            letter_constraint: branch.letter_constraint,
            is_canonical: branch.is_canonical,
            status: BranchStatus::Active,
            created_by: branch.created_by,
            created_at: Utc::now(),
        };
        self.lock()?.branches.push(branch.clone());
        Ok(branch)
    }

    async fn get_branch(&self, branch_id: Uuid) -> PortResult<Branch> {
        self.lock()?
            .branches
            .iter()
            .find(|b| b.id == branch_id)
            .cloned()
            .ok_or_else(|| not_found(branch_id))
    }

    async fn find_branches(&self, filter: BranchFilter) -> PortResult<Vec<VotedBranch>> {
        let inner = self.lock()?;
        Ok(inner
            .branches
            .iter()
            .filter(|b| filter.matches(b))
            .map(|b| VotedBranch {
                branch: b.clone(),
                votes: inner
                    .votes
                    .iter()
                    .filter(|v| v.branch_id == b.id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    async fn update_branch(&self, branch_id: Uuid, update: BranchUpdate) -> PortResult<Branch> {
        let mut inner = self.lock()?;
        let branch = inner
            .branches
            .iter_mut()
            .find(|b| b.id == branch_id)
            .ok_or_else(|| not_found(branch_id))?;
        if let Some(is_canonical) = update.is_canonical {
            branch.is_canonical = is_canonical;
        }
        if let Some(status) = update.status {
            branch.status = status;
        }
        Ok(branch.clone())
    }

    async fn set_canonical(&self, branch_id: Uuid, is_canonical: bool) -> PortResult<Branch> {
        let mut inner = self.lock()?;
        let reference = inner
            .branches
            .iter()
            .find(|b| b.id == branch_id)
            .map(|b| b.reference.clone())
            .ok_or_else(|| not_found(branch_id))?;

        let mut updated = None;
        for branch in inner.branches.iter_mut() {
            if branch.id == branch_id {
                branch.is_canonical = is_canonical;
                updated = Some(branch.clone());
            } else if is_canonical && branch.reference == reference {
                branch.is_canonical = false;
            }
        }
        updated.ok_or_else(|| not_found(branch_id))
    }
}

#[async_trait]
impl VoteStore for InMemoryStore {
    async fn upsert_vote(
        &self,
        user_id: Uuid,
        branch_id: Uuid,
        value: VoteValue,
    ) -> PortResult<()> {
        let mut inner = self.lock()?;
        match inner
            .votes
            .iter_mut()
            .find(|v| v.user_id == user_id && v.branch_id == branch_id)
        {
            Some(existing) => existing.value = value,
            None => inner.votes.push(Vote {
                user_id,
                branch_id,
                value,
            }),
        }
        Ok(())
    }

    async fn delete_vote(&self, user_id: Uuid, branch_id: Uuid) -> PortResult<()> {
        self.lock()?
            .votes
            .retain(|v| !(v.user_id == user_id && v.branch_id == branch_id));
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity> {
        self.lock()?
            .sessions
            .get(session_id)
            .copied()
            .ok_or(PortError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Level;

    fn draft(reference: &str, content: &str) -> NewBranch {
        NewBranch {
            level: Level::Book,
            reference: reference.to_string(),
            parent_branch_id: None,
            content: content.to_string(),
            letter_constraint: None,
            is_canonical: false,
            created_by: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn find_returns_insertion_order() {
        let store = InMemoryStore::new();
        store.insert_branch(draft("GEN", "one")).await.unwrap();
        store.insert_branch(draft("EXO", "two")).await.unwrap();
        store.insert_branch(draft("GEN", "three")).await.unwrap();

        let found = store
            .find_branches(BranchFilter {
                reference: Some("GEN".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let contents: Vec<&str> = found.iter().map(|vb| vb.branch.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn find_by_reference_set() {
        let store = InMemoryStore::new();
        store.insert_branch(draft("GEN", "one")).await.unwrap();
        store.insert_branch(draft("LEV", "two")).await.unwrap();
        store.insert_branch(draft("EXO", "three")).await.unwrap();
        store.insert_branch(draft("GEN", "four")).await.unwrap();

        let found = store
            .find_branches(BranchFilter {
                reference_in: Some(vec!["GEN".into(), "EXO".into()]),
                ..Default::default()
            })
            .await
            .unwrap();
        let found: Vec<(&str, &str)> = found
            .iter()
            .map(|vb| (vb.branch.reference.as_str(), vb.branch.content.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![("GEN", "one"), ("EXO", "three"), ("GEN", "four")]
        );

        let none = store
            .find_branches(BranchFilter {
                reference_in: Some(vec![]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn canonical_flag_is_exclusive_per_reference() {
        let store = InMemoryStore::new();
        let a = store.insert_branch(draft("GEN", "a")).await.unwrap();
        let b = store.insert_branch(draft("GEN", "b")).await.unwrap();
        let other = store.insert_branch(draft("EXO", "c")).await.unwrap();

        store.set_canonical(a.id, true).await.unwrap();
        store.set_canonical(other.id, true).await.unwrap();
        store.set_canonical(b.id, true).await.unwrap();

        assert!(!store.get_branch(a.id).await.unwrap().is_canonical);
        assert!(store.get_branch(b.id).await.unwrap().is_canonical);
        assert!(store.get_branch(other.id).await.unwrap().is_canonical);

        store.set_canonical(b.id, false).await.unwrap();
        let canonical = store.find_branches(BranchFilter::canonical()).await.unwrap();
        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0].branch.id, other.id);
    }

    #[tokio::test]
    async fn concurrent_sibling_toggles_leave_one_canonical() {
        let store = InMemoryStore::new();
        let a = store.insert_branch(draft("RUT", "a")).await.unwrap();
        let b = store.insert_branch(draft("RUT", "b")).await.unwrap();

        let (first, second) = tokio::join!(
            store.set_canonical(a.id, true),
            store.set_canonical(b.id, true)
        );
        first.unwrap();
        second.unwrap();

        let canonical = store.find_branches(BranchFilter::canonical()).await.unwrap();
        assert_eq!(canonical.len(), 1);
    }

    #[tokio::test]
    async fn one_vote_per_user_per_branch() {
        let store = InMemoryStore::new();
        let branch = store.insert_branch(draft("GEN", "a")).await.unwrap();
        let user = Uuid::new_v4();

        store.upsert_vote(user, branch.id, VoteValue::Up).await.unwrap();
        store.upsert_vote(user, branch.id, VoteValue::Down).await.unwrap();
        let found = store.find_branches(BranchFilter::default()).await.unwrap();
        assert_eq!(found[0].votes.len(), 1);
        assert_eq!(found[0].votes[0].value, VoteValue::Down);

        store.delete_vote(user, branch.id).await.unwrap();
        store.delete_vote(user, branch.id).await.unwrap();
        let found = store.find_branches(BranchFilter::default()).await.unwrap();
        assert!(found[0].votes.is_empty());
    }

    #[tokio::test]
    async fn missing_branch_is_not_found() {
        let store = InMemoryStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.get_branch(missing).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            store.set_canonical(missing, true).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sessions_resolve_to_identities() {
        let store = InMemoryStore::new();
        let identity = Identity {
            user_id: Uuid::new_v4(),
            is_admin: true,
        };
        store.add_session("abc", identity).unwrap();

        assert_eq!(store.validate_auth_session("abc").await.unwrap(), identity);
        assert!(matches!(
            store.validate_auth_session("nope").await,
            Err(PortError::Unauthorized)
        ));
    }
}
