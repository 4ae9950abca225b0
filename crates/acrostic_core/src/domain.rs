//! crates/acrostic_core/src/domain.rs
//!
//! Defines the core data structures for the application: hierarchy levels,
//! contributed branches and the votes cast on them.
//! These structs are independent of any database; serde is derived only so the
//! web layer can ship them as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Hierarchy Levels
//=========================================================================================

/// A rung in the memorization hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Testament,
    Book,
    Chapter,
    Verse,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Testament => "testament",
            Level::Book => "book",
            Level::Chapter => "chapter",
            Level::Verse => "verse",
        }
    }

    /// The level a branch at this level hangs under, if any.
    pub fn parent(&self) -> Option<Level> {
        match self {
            Level::Testament => None,
            Level::Book => Some(Level::Testament),
            Level::Chapter => Some(Level::Book),
            Level::Verse => Some(Level::Chapter),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a known level")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testament" => Ok(Level::Testament),
            "book" => Ok(Level::Book),
            "chapter" => Ok(Level::Chapter),
            "verse" => Ok(Level::Verse),
            other => Err(UnknownLevel(other.to_string())),
        }
    }
}

/// The two testaments of the canon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Testament {
    OT,
    NT,
}

impl Testament {
    pub const ALL: [Testament; 2] = [Testament::OT, Testament::NT];

    pub fn code(&self) -> &'static str {
        match self {
            Testament::OT => "OT",
            Testament::NT => "NT",
        }
    }

    pub fn from_code(code: &str) -> Option<Testament> {
        match code {
            "OT" => Some(Testament::OT),
            "NT" => Some(Testament::NT),
            _ => None,
        }
    }
}

impl fmt::Display for Testament {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

//=========================================================================================
// Branches
//=========================================================================================

/// Moderation state of a branch. Branches are archived, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchStatus {
    Active,
    Archived,
    Flagged,
}

impl BranchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchStatus::Active => "active",
            BranchStatus::Archived => "archived",
            BranchStatus::Flagged => "flagged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a known branch status")]
pub struct UnknownStatus(pub String);

impl FromStr for BranchStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BranchStatus::Active),
            "archived" => Ok(BranchStatus::Archived),
            "flagged" => Ok(BranchStatus::Flagged),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// One contributed acrostic/mnemonic for a single reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: Uuid,
    pub level: Level,
    pub reference: String,
    pub parent_branch_id: Option<Uuid>,
    pub content: String,
    pub letter_constraint: Option<char>,
    pub is_canonical: bool,
    pub status: BranchStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// The fields a contributor supplies when creating a branch.
#[derive(Debug, Clone)]
pub struct NewBranch {
    pub level: Level,
    pub reference: String,
    pub parent_branch_id: Option<Uuid>,
    pub content: String,
    pub letter_constraint: Option<char>,
    pub is_canonical: bool,
    pub created_by: Uuid,
}

/// Administrative changes to an existing branch.
#[derive(Debug, Clone, Default)]
pub struct BranchUpdate {
    pub is_canonical: Option<bool>,
    pub status: Option<BranchStatus>,
}

/// Query parameters for `BranchStore::find_branches`. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct BranchFilter {
    pub level: Option<Level>,
    pub reference: Option<String>,
    pub reference_in: Option<Vec<String>>,
    pub parent_id: Option<Uuid>,
    pub is_canonical: Option<bool>,
}

impl BranchFilter {
    pub fn canonical() -> Self {
        Self {
            is_canonical: Some(true),
            ..Default::default()
        }
    }

    /// Returns true if `branch` satisfies every set field.
    pub fn matches(&self, branch: &Branch) -> bool {
        self.level.map_or(true, |l| branch.level == l)
            && self
                .reference
                .as_ref()
                .map_or(true, |r| &branch.reference == r)
            && self
                .reference_in
                .as_ref()
                .map_or(true, |refs| refs.iter().any(|r| r == &branch.reference))
            && self
                .parent_id
                .map_or(true, |p| branch.parent_branch_id == Some(p))
            && self.is_canonical.map_or(true, |c| branch.is_canonical == c)
    }
}

//=========================================================================================
// Votes
//=========================================================================================

/// A single up or down vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i16(&self) -> i16 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }

    pub fn from_i16(value: i16) -> Option<VoteValue> {
        match value {
            1 => Some(VoteValue::Up),
            -1 => Some(VoteValue::Down),
            _ => None,
        }
    }
}

/// A stored vote row. Identity is `(user_id, branch_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub user_id: Uuid,
    pub branch_id: Uuid,
    pub value: VoteValue,
}

/// A branch joined with the vote rows cast on it.
#[derive(Debug, Clone)]
pub struct VotedBranch {
    pub branch: Branch,
    pub votes: Vec<Vote>,
}

//=========================================================================================
// Identity
//=========================================================================================

/// The authenticated caller, resolved once at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub is_admin: bool,
}
