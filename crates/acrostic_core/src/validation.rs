//! crates/acrostic_core/src/validation.rs
//!
//! Decides whether submitted text is a legal acrostic for a level and reference.
//! Creation and quick-edit flows both go through `validate`.
//!
//! One letter stands for one child unit (book, chapter or verse), however many
//! words carry the letters.

use crate::constraint::required_count;
use crate::domain::Level;
use crate::ports::StructureLookup;

/// Why a draft was rejected. The messages are shown inline next to the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Content cannot be empty")]
    Empty,

    #[error("Must have exactly {expected} letters (currently {actual})")]
    LetterCount { expected: usize, actual: usize },

    #[error("Must start with the letter \"{expected}\" (currently \"{actual}\")")]
    FirstLetter { expected: char, actual: char },

    #[error("Letter constraint must be a single letter (got \"{0}\")")]
    InvalidLetterConstraint(String),
}

/// Strips every character that is not an ASCII letter.
pub fn clean_text(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphabetic()).collect()
}

/// Validates `text` as a contribution at `level` for `reference`.
pub fn validate(
    structure: &dyn StructureLookup,
    text: &str,
    level: Level,
    reference: &str,
    required_first_letter: Option<char>,
) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    // Verses are free-text mnemonics, not acrostics.
    if level == Level::Verse {
        return Ok(());
    }

    let clean = clean_text(text);
    let expected = required_count(structure, level, reference);
    if expected > 0 && clean.len() != expected {
        return Err(ValidationError::LetterCount {
            expected,
            actual: clean.len(),
        });
    }

    if let (Some(expected), Some(first)) = (required_first_letter, clean.chars().next()) {
        if !first.eq_ignore_ascii_case(&expected) {
            return Err(ValidationError::FirstLetter {
                expected: expected.to_ascii_uppercase(),
                actual: first.to_ascii_uppercase(),
            });
        }
    }

    Ok(())
}

/// Parses a user-supplied letter constraint: exactly one ASCII letter, any case.
pub fn parse_letter_constraint(raw: &str) -> Result<char, ValidationError> {
    let mut chars = raw.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(ValidationError::InvalidLetterConstraint(raw.to_string())),
    }
}

/// The letter of the parent acrostic that a child at `ordinal` (1-based) must
/// start with, if the parent is long enough.
pub fn derive_letter_constraint(parent_content: &str, ordinal: usize) -> Option<char> {
    let index = ordinal.checked_sub(1)?;
    clean_text(parent_content)
        .chars()
        .nth(index)
        .map(|c| c.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::KjvStructure;

    #[test]
    fn empty_is_rejected_at_every_level() {
        let s = KjvStructure::new();
        for level in [Level::Testament, Level::Book, Level::Chapter, Level::Verse] {
            assert_eq!(
                validate(&s, "   \n\t", level, "GEN", None),
                Err(ValidationError::Empty)
            );
        }
        assert_eq!(ValidationError::Empty.to_string(), "Content cannot be empty");
    }

    #[test]
    fn verses_are_free_text() {
        let s = KjvStructure::new();
        assert_eq!(
            validate(&s, "In the beginning, God!", Level::Verse, "GEN.1.1", Some('Z')),
            Ok(())
        );
        assert_eq!(validate(&s, "x", Level::Verse, "nonsense", None), Ok(()));
    }

    #[test]
    fn letter_count_scenario() {
        let s = KjvStructure::new();
        let result = validate(&s, "First God Created Everything", Level::Book, "GEN", None);
        assert_eq!(
            result,
            Err(ValidationError::LetterCount {
                expected: 50,
                actual: 25
            })
        );
        assert_eq!(
            result.unwrap_err().to_string(),
            "Must have exactly 50 letters (currently 25)"
        );
    }

    #[test]
    fn letters_not_words_are_counted() {
        let s = KjvStructure::new();
        // RUT has 4 chapters.
        assert_eq!(validate(&s, "N-a o.m!", Level::Book, "RUT", None), Ok(()));
        assert!(validate(&s, "Naomi", Level::Book, "RUT", None).is_err());
        assert_eq!(validate(&s, "Na 0 mi", Level::Book, "RUT", None), Ok(()));
    }

    #[test]
    fn testament_needs_one_letter_per_book() {
        let s = KjvStructure::new();
        let thirty_nine = "a".repeat(39);
        assert_eq!(validate(&s, &thirty_nine, Level::Testament, "OT", None), Ok(()));
        assert_eq!(
            validate(&s, &thirty_nine, Level::Testament, "NT", None),
            Err(ValidationError::LetterCount {
                expected: 27,
                actual: 39
            })
        );
    }

    #[test]
    fn unknown_reference_disables_count() {
        let s = KjvStructure::new();
        assert_eq!(validate(&s, "anything", Level::Book, "XYZ", None), Ok(()));
        assert_eq!(validate(&s, "anything", Level::Chapter, "GEN.999", None), Ok(()));
    }

    #[test]
    fn first_letter_is_case_insensitive() {
        let s = KjvStructure::new();
        assert_eq!(validate(&s, "apple", Level::Chapter, "XYZ.1", Some('A')), Ok(()));
        assert_eq!(validate(&s, "Apple", Level::Chapter, "XYZ.1", Some('a')), Ok(()));
        // OBA has a single chapter.
        assert_eq!(validate(&s, "o", Level::Book, "OBA", Some('O')), Ok(()));

        let err = validate(&s, "apple", Level::Chapter, "XYZ.1", Some('B')).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FirstLetter {
                expected: 'B',
                actual: 'A'
            }
        );
        assert_eq!(
            err.to_string(),
            "Must start with the letter \"B\" (currently \"A\")"
        );
    }

    #[test]
    fn first_letter_skips_leading_non_letters() {
        let s = KjvStructure::new();
        assert_eq!(validate(&s, "1. \"Oh\"", Level::Book, "XYZ", Some('o')), Ok(()));
    }

    #[test]
    fn count_is_checked_before_first_letter() {
        let s = KjvStructure::new();
        assert_eq!(
            validate(&s, "zz", Level::Book, "RUT", Some('A')),
            Err(ValidationError::LetterCount {
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn clean_text_is_idempotent() {
        for raw in ["First God Created Everything", "a1b2 c3!", "", "ÀBC déf"] {
            let once = clean_text(raw);
            assert_eq!(clean_text(&once), once);
        }
        assert_eq!(clean_text("ÀBC déf"), "BCdf");
    }

    #[test]
    fn letter_constraints() {
        assert_eq!(parse_letter_constraint("g"), Ok('G'));
        assert_eq!(parse_letter_constraint(" Q "), Ok('Q'));
        assert!(parse_letter_constraint("").is_err());
        assert!(parse_letter_constraint("ab").is_err());
        assert!(parse_letter_constraint("7").is_err());
    }

    #[test]
    fn derived_constraints_follow_parent_letters() {
        assert_eq!(derive_letter_constraint("In the beginning", 1), Some('I'));
        assert_eq!(derive_letter_constraint("In the beginning", 3), Some('T'));
        assert_eq!(derive_letter_constraint("In, the", 4), Some('H'));
        assert_eq!(derive_letter_constraint("abc", 4), None);
        assert_eq!(derive_letter_constraint("abc", 0), None);
    }
}
