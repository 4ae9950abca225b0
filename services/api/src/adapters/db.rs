//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! storage and identity ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use std::collections::HashMap;

use acrostic_core::domain::{
    Branch, BranchFilter, BranchUpdate, Identity, NewBranch, Vote, VoteValue, VotedBranch,
};
use acrostic_core::ports::{BranchStore, IdentityStore, PortError, PortResult, VoteStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const BRANCH_COLUMNS: &str = "id, level, reference, parent_branch_id, content, letter_constraint, \
     is_canonical, status, created_by, created_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `BranchStore`, `VoteStore` and
/// `IdentityStore` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Makes sure a user row exists, e.g. for the account a seed import is
    /// attributed to.
    pub async fn ensure_user(&self, user_id: Uuid, is_admin: bool) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO users (id, is_admin) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET is_admin = users.is_admin OR EXCLUDED.is_admin",
        )
        .bind(user_id)
        .bind(is_admin)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn branch_error(branch_id: Uuid) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("Branch {} not found", branch_id)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct BranchRecord {
    id: Uuid,
    level: String,
    reference: String,
    parent_branch_id: Option<Uuid>,
    content: String,
    letter_constraint: Option<String>,
    is_canonical: bool,
    status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}
impl BranchRecord {
    fn to_domain(self) -> PortResult<Branch> {
        Ok(Branch {
            id: self.id,
            level: self
                .level
                .parse()
                .map_err(|e| PortError::Unexpected(format!("branch {}: {}", self.id, e)))?,
            reference: self.reference,
            parent_branch_id: self.parent_branch_id,
            content: self.content,
            letter_constraint: self.letter_constraint.and_then(|s| s.chars().next()),
            is_canonical: self.is_canonical,
            status: self
                .status
                .parse()
                .map_err(|e| PortError::Unexpected(format!("branch {}: {}", self.id, e)))?,
            created_by: self.created_by,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct VoteRecord {
    user_id: Uuid,
    branch_id: Uuid,
    value: i16,
}
impl VoteRecord {
    fn to_domain(self) -> PortResult<Vote> {
        let value = VoteValue::from_i16(self.value).ok_or_else(|| {
            PortError::Unexpected(format!(
                "vote by {} on {} has value {}",
                self.user_id, self.branch_id, self.value
            ))
        })?;
        Ok(Vote {
            user_id: self.user_id,
            branch_id: self.branch_id,
            value,
        })
    }
}

#[derive(FromRow)]
struct IdentityRecord {
    id: Uuid,
    is_admin: bool,
}

//=========================================================================================
// `BranchStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BranchStore for DbAdapter {
    async fn insert_branch(&self, branch: NewBranch) -> PortResult<Branch> {
        let sql = format!(
            "INSERT INTO branches \
             (id, level, reference, parent_branch_id, content, letter_constraint, is_canonical, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            BRANCH_COLUMNS
        );
        let record = sqlx::query_as::<_, BranchRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(branch.level.as_str())
            .bind(&branch.reference)
            .bind(branch.parent_branch_id)
            .bind(&branch.content)
            .bind(branch.letter_constraint.map(|c| c.to_string()))
            .bind(branch.is_canonical)
            .bind(branch.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_branch(&self, branch_id: Uuid) -> PortResult<Branch> {
        let sql = format!("SELECT {} FROM branches WHERE id = $1", BRANCH_COLUMNS);
        let record = sqlx::query_as::<_, BranchRecord>(&sql)
            .bind(branch_id)
            .fetch_one(&self.pool)
            .await
            .map_err(branch_error(branch_id))?;
        record.to_domain()
    }

    async fn find_branches(&self, filter: BranchFilter) -> PortResult<Vec<VotedBranch>> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM branches WHERE TRUE", BRANCH_COLUMNS));
        if let Some(level) = filter.level {
            query.push(" AND level = ").push_bind(level.as_str());
        }
        if let Some(reference) = filter.reference {
            query.push(" AND reference = ").push_bind(reference);
        }
        if let Some(references) = filter.reference_in {
            query.push(" AND reference = ANY(").push_bind(references).push(")");
        }
        if let Some(parent_id) = filter.parent_id {
            query.push(" AND parent_branch_id = ").push_bind(parent_id);
        }
        if let Some(is_canonical) = filter.is_canonical {
            query.push(" AND is_canonical = ").push_bind(is_canonical);
        }
        // Ranking ties are broken by this order.
        query.push(" ORDER BY created_at ASC, id ASC");

        let branches = query
            .build_query_as::<BranchRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(BranchRecord::to_domain)
            .collect::<PortResult<Vec<Branch>>>()?;

        let ids: Vec<Uuid> = branches.iter().map(|b| b.id).collect();
        let mut votes: HashMap<Uuid, Vec<Vote>> = HashMap::new();
        if !ids.is_empty() {
            let records = sqlx::query_as::<_, VoteRecord>(
                "SELECT user_id, branch_id, value FROM votes WHERE branch_id = ANY($1)",
            )
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
            for record in records {
                let vote = record.to_domain()?;
                votes.entry(vote.branch_id).or_default().push(vote);
            }
        }

        Ok(branches
            .into_iter()
            .map(|branch| VotedBranch {
                votes: votes.remove(&branch.id).unwrap_or_default(),
                branch,
            })
            .collect())
    }

    async fn update_branch(&self, branch_id: Uuid, update: BranchUpdate) -> PortResult<Branch> {
        let sql = format!(
            "UPDATE branches SET \
             is_canonical = COALESCE($2, is_canonical), \
             status = COALESCE($3, status) \
             WHERE id = $1 RETURNING {}",
            BRANCH_COLUMNS
        );
        let record = sqlx::query_as::<_, BranchRecord>(&sql)
            .bind(branch_id)
            .bind(update.is_canonical)
            .bind(update.status.map(|s| s.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(branch_error(branch_id))?;
        record.to_domain()
    }

    async fn set_canonical(&self, branch_id: Uuid, is_canonical: bool) -> PortResult<Branch> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let reference: String =
            sqlx::query_scalar("SELECT reference FROM branches WHERE id = $1 FOR UPDATE")
                .bind(branch_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(branch_error(branch_id))?;

        // Lock every sibling so concurrent toggles at one reference serialize.
        sqlx::query("SELECT id FROM branches WHERE reference = $1 ORDER BY id FOR UPDATE")
            .bind(&reference)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        if is_canonical {
            sqlx::query(
                "UPDATE branches SET is_canonical = FALSE \
                 WHERE reference = $1 AND id <> $2 AND is_canonical",
            )
            .bind(&reference)
            .bind(branch_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        let sql = format!(
            "UPDATE branches SET is_canonical = $2 WHERE id = $1 RETURNING {}",
            BRANCH_COLUMNS
        );
        let record = sqlx::query_as::<_, BranchRecord>(&sql)
            .bind(branch_id)
            .bind(is_canonical)
            .fetch_one(&mut *tx)
            .await
            .map_err(branch_error(branch_id))?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }
}

//=========================================================================================
// `VoteStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl VoteStore for DbAdapter {
    async fn upsert_vote(
        &self,
        user_id: Uuid,
        branch_id: Uuid,
        value: VoteValue,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO votes (user_id, branch_id, value) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, branch_id) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(user_id)
        .bind(branch_id)
        .bind(value.as_i16())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_vote(&self, user_id: Uuid, branch_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM votes WHERE user_id = $1 AND branch_id = $2")
            .bind(user_id)
            .bind(branch_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// `IdentityStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityStore for DbAdapter {
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            "SELECT u.id, u.is_admin FROM auth_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        Ok(Identity {
            user_id: record.id,
            is_admin: record.is_admin,
        })
    }
}
