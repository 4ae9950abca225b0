//! crates/acrostic_core/src/contribution.rs
//!
//! The write side: creating branches, voting, and the administrative toggles.
//! Every operation takes the caller's `Identity` explicitly.

use tracing::info;
use uuid::Uuid;

use crate::domain::{
    Branch, BranchFilter, BranchStatus, BranchUpdate, Identity, Level, NewBranch, VoteValue,
};
use crate::ports::{BranchStore, PortError, PortResult, StructureLookup, VoteStore};
use crate::reference::{Reference, ReferenceError};
use crate::selection::{compete, Competition};
use crate::validation::{
    derive_letter_constraint, parse_letter_constraint, validate, ValidationError,
};

#[derive(Debug, thiserror::Error)]
pub enum ContributionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("Parent branch {parent_id} cannot contain a {level} branch for '{reference}'")]
    ParentMismatch {
        parent_id: Uuid,
        level: Level,
        reference: String,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

/// A contributor's draft, as received from the request boundary.
#[derive(Debug, Clone)]
pub struct NewBranchRequest {
    pub level: Level,
    pub reference: String,
    pub parent_branch_id: Option<Uuid>,
    pub content: String,
    pub letter_constraint: Option<String>,
}

/// Validates a draft and persists it as a new, non-canonical branch.
///
/// When a parent is given it must sit exactly one level up at the enclosing
/// reference; if the draft carries no letter constraint, one is derived from the
/// parent's letter at this unit's position.
pub async fn create_branch(
    store: &dyn BranchStore,
    structure: &dyn StructureLookup,
    identity: &Identity,
    request: NewBranchRequest,
) -> Result<Branch, ContributionError> {
    let reference = Reference::parse(request.level, &request.reference, structure)?;

    let mut letter_constraint = request
        .letter_constraint
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_letter_constraint)
        .transpose()?;

    if let Some(parent_id) = request.parent_branch_id {
        let parent = store.get_branch(parent_id).await?;
        let expected_reference = reference.parent(structure).map(|r| r.to_string());
        if Some(parent.level) != request.level.parent()
            || Some(&parent.reference) != expected_reference.as_ref()
        {
            return Err(ContributionError::ParentMismatch {
                parent_id,
                level: request.level,
                reference: request.reference,
            });
        }

        if letter_constraint.is_none() {
            letter_constraint = reference
                .ordinal(structure)
                .and_then(|ordinal| derive_letter_constraint(&parent.content, ordinal));
        }
    }

    let reference = reference.to_string();
    validate(
        structure,
        &request.content,
        request.level,
        &reference,
        letter_constraint,
    )?;

    let branch = store
        .insert_branch(NewBranch {
            level: request.level,
            reference,
            parent_branch_id: request.parent_branch_id,
            content: request.content.trim().to_string(),
            letter_constraint,
            is_canonical: false,
            created_by: identity.user_id,
        })
        .await?;
    info!(
        "User {} created {} branch {} for {}",
        identity.user_id, branch.level, branch.id, branch.reference
    );

    Ok(branch)
}

/// Records the caller's vote. `None` retracts it.
///
/// The caller sends the final value rather than a toggle, so concurrent
/// requests from one user settle on the last write.
pub async fn cast_vote(
    branches: &dyn BranchStore,
    votes: &dyn VoteStore,
    identity: &Identity,
    branch_id: Uuid,
    value: Option<VoteValue>,
) -> Result<(), ContributionError> {
    branches.get_branch(branch_id).await?;

    match value {
        Some(value) => votes.upsert_vote(identity.user_id, branch_id, value).await?,
        None => votes.delete_vote(identity.user_id, branch_id).await?,
    }
    Ok(())
}

/// Marks or unmarks a branch as the official one for its reference. Admin only.
pub async fn set_canonical(
    store: &dyn BranchStore,
    identity: &Identity,
    branch_id: Uuid,
    is_canonical: bool,
) -> Result<Branch, ContributionError> {
    require_admin(identity)?;
    let branch = store.set_canonical(branch_id, is_canonical).await?;
    info!(
        "Admin {} set canonical={} on branch {} ({})",
        identity.user_id, is_canonical, branch.id, branch.reference
    );
    Ok(branch)
}

/// Archives, flags or reactivates a branch. Admin only.
pub async fn set_status(
    store: &dyn BranchStore,
    identity: &Identity,
    branch_id: Uuid,
    status: BranchStatus,
) -> Result<Branch, ContributionError> {
    require_admin(identity)?;
    let branch = store
        .update_branch(
            branch_id,
            BranchUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
        .await?;
    info!(
        "Admin {} set status={} on branch {}",
        identity.user_id,
        status.as_str(),
        branch.id
    );
    Ok(branch)
}

/// Loads matching branches and ranks each reference's siblings.
pub async fn competitions(
    store: &dyn BranchStore,
    filter: BranchFilter,
) -> PortResult<Vec<Competition>> {
    Ok(compete(store.find_branches(filter).await?))
}

fn require_admin(identity: &Identity) -> Result<(), ContributionError> {
    if identity.is_admin {
        Ok(())
    } else {
        Err(ContributionError::Forbidden(
            "administrator rights are required".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::structure::KjvStructure;

    fn user() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            is_admin: false,
        }
    }

    fn admin() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            is_admin: true,
        }
    }

    fn request(level: Level, reference: &str, content: &str) -> NewBranchRequest {
        NewBranchRequest {
            level,
            reference: reference.to_string(),
            parent_branch_id: None,
            content: content.to_string(),
            letter_constraint: None,
        }
    }

    #[tokio::test]
    async fn new_branches_are_active_and_not_canonical() {
        let store = InMemoryStore::new();
        let identity = user();
        let branch = create_branch(
            &store,
            &KjvStructure::new(),
            &identity,
            request(Level::Book, "RUT", "  Nobz "),
        )
        .await
        .unwrap();

        assert!(!branch.is_canonical);
        assert_eq!(branch.status, BranchStatus::Active);
        assert_eq!(branch.created_by, identity.user_id);
        assert_eq!(branch.content, "Nobz");
        assert_eq!(store.get_branch(branch.id).await.unwrap(), branch);
    }

    #[tokio::test]
    async fn writes_reject_bad_references() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();

        for (level, reference) in [
            (Level::Chapter, "GEN"),
            (Level::Book, "XYZ"),
            (Level::Verse, "GEN.1.32"),
            (Level::Testament, "AT"),
        ] {
            let result =
                create_branch(&store, &structure, &user(), request(level, reference, "abc")).await;
            assert!(
                matches!(result, Err(ContributionError::Reference(_))),
                "{} {}",
                level,
                reference
            );
        }
        assert!(store
            .find_branches(BranchFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn content_is_validated_before_insert() {
        let store = InMemoryStore::new();
        let result = create_branch(
            &store,
            &KjvStructure::new(),
            &user(),
            request(Level::Book, "GEN", "First God Created Everything"),
        )
        .await;

        match result {
            Err(ContributionError::Validation(e)) => {
                assert_eq!(e.to_string(), "Must have exactly 50 letters (currently 25)")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn child_inherits_letter_from_parent() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();
        let book = create_branch(&store, &structure, &user(), request(Level::Book, "RUT", "Nobz"))
            .await
            .unwrap();

        // RUT.2 has 23 verses and sits under the second letter, "o".
        let mut chapter = request(Level::Chapter, "RUT.2", &format!("O{}", "a".repeat(22)));
        chapter.parent_branch_id = Some(book.id);
        let created = create_branch(&store, &structure, &user(), chapter.clone())
            .await
            .unwrap();
        assert_eq!(created.letter_constraint, Some('O'));
        assert_eq!(created.parent_branch_id, Some(book.id));

        chapter.content = "a".repeat(23);
        let result = create_branch(&store, &structure, &user(), chapter).await;
        assert!(matches!(
            result,
            Err(ContributionError::Validation(ValidationError::FirstLetter {
                expected: 'O',
                actual: 'A'
            }))
        ));
    }

    #[tokio::test]
    async fn explicit_letter_overrides_parent() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();
        let book = create_branch(&store, &structure, &user(), request(Level::Book, "RUT", "Nobz"))
            .await
            .unwrap();

        let mut chapter = request(Level::Chapter, "RUT.2", &"z".repeat(23));
        chapter.parent_branch_id = Some(book.id);
        chapter.letter_constraint = Some("z".to_string());
        let created = create_branch(&store, &structure, &user(), chapter)
            .await
            .unwrap();
        assert_eq!(created.letter_constraint, Some('Z'));
    }

    #[tokio::test]
    async fn parent_must_enclose_the_reference() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();
        let book = create_branch(&store, &structure, &user(), request(Level::Book, "RUT", "Nobz"))
            .await
            .unwrap();

        let mut elsewhere = request(Level::Chapter, "OBA.1", &"a".repeat(21));
        elsewhere.parent_branch_id = Some(book.id);
        assert!(matches!(
            create_branch(&store, &structure, &user(), elsewhere).await,
            Err(ContributionError::ParentMismatch { .. })
        ));

        let mut skipped_level = request(Level::Verse, "RUT.1.1", "Now");
        skipped_level.parent_branch_id = Some(book.id);
        assert!(matches!(
            create_branch(&store, &structure, &user(), skipped_level).await,
            Err(ContributionError::ParentMismatch { .. })
        ));

        let mut missing = request(Level::Chapter, "RUT.1", &"a".repeat(22));
        missing.parent_branch_id = Some(Uuid::new_v4());
        assert!(matches!(
            create_branch(&store, &structure, &user(), missing).await,
            Err(ContributionError::Port(PortError::NotFound(_)))
        ));
    }

    async fn top_score(store: &InMemoryStore) -> Option<i64> {
        competitions(store, BranchFilter::default()).await.unwrap()[0]
            .winner()
            .map(|w| w.score)
    }

    #[tokio::test]
    async fn votes_settle_on_the_last_value() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();
        let voter = user();
        let branch = create_branch(&store, &structure, &voter, request(Level::Book, "RUT", "Nobz"))
            .await
            .unwrap();

        cast_vote(&store, &store, &voter, branch.id, Some(VoteValue::Up))
            .await
            .unwrap();
        cast_vote(&store, &store, &user(), branch.id, Some(VoteValue::Up))
            .await
            .unwrap();
        assert_eq!(top_score(&store).await, Some(2));

        cast_vote(&store, &store, &voter, branch.id, Some(VoteValue::Down))
            .await
            .unwrap();
        assert_eq!(top_score(&store).await, Some(0));

        cast_vote(&store, &store, &voter, branch.id, None)
            .await
            .unwrap();
        assert_eq!(top_score(&store).await, Some(1));

        assert!(matches!(
            cast_vote(&store, &store, &voter, Uuid::new_v4(), Some(VoteValue::Up)).await,
            Err(ContributionError::Port(PortError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn moderation_requires_admin() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();
        let branch = create_branch(&store, &structure, &user(), request(Level::Book, "RUT", "Nobz"))
            .await
            .unwrap();

        assert!(matches!(
            set_canonical(&store, &user(), branch.id, true).await,
            Err(ContributionError::Forbidden(_))
        ));
        assert!(matches!(
            set_status(&store, &user(), branch.id, BranchStatus::Flagged).await,
            Err(ContributionError::Forbidden(_))
        ));
        assert!(!store.get_branch(branch.id).await.unwrap().is_canonical);

        let canonical = set_canonical(&store, &admin(), branch.id, true).await.unwrap();
        assert!(canonical.is_canonical);
        let archived = set_status(&store, &admin(), branch.id, BranchStatus::Archived)
            .await
            .unwrap();
        assert_eq!(archived.status, BranchStatus::Archived);
        assert!(archived.is_canonical);
    }

    #[tokio::test]
    async fn canonical_branch_wins_its_competition() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();
        let popular = create_branch(&store, &structure, &user(), request(Level::Book, "RUT", "Nobz"))
            .await
            .unwrap();
        let official = create_branch(&store, &structure, &user(), request(Level::Book, "RUT", "Ruth"))
            .await
            .unwrap();
        cast_vote(&store, &store, &user(), popular.id, Some(VoteValue::Up))
            .await
            .unwrap();
        set_canonical(&store, &admin(), official.id, true)
            .await
            .unwrap();

        let result = competitions(
            &store,
            BranchFilter {
                level: Some(Level::Book),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].alternatives_count, 1);
        assert_eq!(result[0].winner().unwrap().branch.id, official.id);
    }
}
