//! crates/acrostic_core/src/selection.rs
//!
//! Ranks sibling branches for one reference and picks the winner shown on
//! browse pages. This is the read-model side: scores are always recomputed
//! from stored vote rows, never taken from a client-held total.

use std::collections::BTreeMap;

use crate::domain::{Branch, Vote, VotedBranch};

/// Net sum of the vote values cast on a branch.
pub fn score(votes: &[Vote]) -> i64 {
    votes.iter().map(|v| i64::from(v.value.as_i16())).sum()
}

/// A branch with its computed score.
#[derive(Debug, Clone)]
pub struct RankedBranch {
    pub branch: Branch,
    pub score: i64,
}

/// Orders branches canonical-first, then by score descending.
///
/// The sort is stable: ties keep input order. Stores return branches oldest
/// first, so the earliest contribution wins a tie.
pub fn rank(branches: Vec<VotedBranch>) -> Vec<RankedBranch> {
    let mut ranked: Vec<RankedBranch> = branches
        .into_iter()
        .map(|vb| RankedBranch {
            score: score(&vb.votes),
            branch: vb.branch,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.branch
            .is_canonical
            .cmp(&a.branch.is_canonical)
            .then(b.score.cmp(&a.score))
    });
    ranked
}

/// The first ranked branch, or `None` when `branches` is empty.
pub fn select_winner(branches: Vec<VotedBranch>) -> Option<RankedBranch> {
    rank(branches).into_iter().next()
}

/// How many non-winning variants exist among `total` siblings.
pub fn alternatives_count(total: usize) -> usize {
    total.saturating_sub(1)
}

/// The outcome of one reference's competition.
#[derive(Debug, Clone)]
pub struct Competition {
    pub reference: String,
    /// Ranked best-first; the winner is `ranked[0]`.
    pub ranked: Vec<RankedBranch>,
    pub alternatives_count: usize,
}

impl Competition {
    pub fn winner(&self) -> Option<&RankedBranch> {
        self.ranked.first()
    }
}

/// Splits branches by reference and ranks each group on its own; branches at
/// different references never compete. Groups come back ordered by reference.
pub fn compete(branches: Vec<VotedBranch>) -> Vec<Competition> {
    let mut groups: BTreeMap<String, Vec<VotedBranch>> = BTreeMap::new();
    for vb in branches {
        groups
            .entry(vb.branch.reference.clone())
            .or_default()
            .push(vb);
    }

    groups
        .into_iter()
        .map(|(reference, siblings)| {
            let alternatives_count = alternatives_count(siblings.len());
            Competition {
                reference,
                ranked: rank(siblings),
                alternatives_count,
            }
        })
        .collect()
}
