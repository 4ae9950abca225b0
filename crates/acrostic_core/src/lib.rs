pub mod constraint;
pub mod contribution;
pub mod domain;
pub mod export;
pub mod memory;
pub mod ports;
pub mod reference;
pub mod seed;
pub mod selection;
pub mod structure;
pub mod validation;

pub use domain::{
    Branch, BranchFilter, BranchStatus, BranchUpdate, Identity, Level, NewBranch, Testament, Vote,
    VoteValue, VotedBranch,
};
pub use ports::{BranchStore, IdentityStore, PortError, PortResult, StructureLookup, VoteStore};
pub use structure::KjvStructure;
