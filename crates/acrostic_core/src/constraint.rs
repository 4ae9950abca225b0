//! crates/acrostic_core/src/constraint.rs
//!
//! How many letters an acrostic at a given level must contain.

use crate::domain::{Level, Testament};
use crate::ports::StructureLookup;
use crate::reference::Reference;
use crate::structure::{NT_BOOK_COUNT, OT_BOOK_COUNT};

/// Returns the number of letters required for an acrostic at `level` for
/// `reference`, or 0 when no count applies.
///
/// Unknown books, malformed references and out-of-range chapters all yield 0,
/// which callers treat as "unconstrained". Verses never carry a count.
pub fn required_count(structure: &dyn StructureLookup, level: Level, reference: &str) -> usize {
    match level {
        Level::Testament => match Testament::from_code(reference) {
            Some(Testament::OT) => OT_BOOK_COUNT,
            Some(Testament::NT) => NT_BOOK_COUNT,
            None => 0,
        },
        Level::Book => structure.book(reference).map_or(0, |b| b.chapter_count()),
        Level::Chapter => match reference.parse::<Reference>() {
            Ok(Reference::Chapter { book, chapter }) => {
                structure.chapter_verse_count(&book, chapter)
            }
            _ => 0,
        },
        Level::Verse => 0,
    }
}
