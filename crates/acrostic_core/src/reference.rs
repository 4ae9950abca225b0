//! crates/acrostic_core/src/reference.rs
//!
//! Dot-delimited references into the hierarchy: `OT`, `GEN`, `GEN.1`, `GEN.1.1`.

use std::fmt;
use std::str::FromStr;

use crate::domain::{Level, Testament};
use crate::ports::StructureLookup;

/// Reasons a reference is rejected for a write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("'{reference}' is not a valid {level} reference.")]
    Malformed { reference: String, level: Level },

    #[error("'{0}' is not a known book.")]
    UnknownBook(String),

    #[error("'{0}' is out of range.")]
    OutOfRange(String),

    #[error("'{0}' is not a well-formed reference.")]
    Syntax(String),
}

/// A parsed position in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    Testament(Testament),
    Book {
        book: String,
    },
    Chapter {
        book: String,
        chapter: usize,
    },
    Verse {
        book: String,
        chapter: usize,
        verse: usize,
    },
}

impl Reference {
    pub fn level(&self) -> Level {
        match self {
            Reference::Testament(_) => Level::Testament,
            Reference::Book { .. } => Level::Book,
            Reference::Chapter { .. } => Level::Chapter,
            Reference::Verse { .. } => Level::Verse,
        }
    }

    pub fn book_code(&self) -> Option<&str> {
        match self {
            Reference::Testament(_) => None,
            Reference::Book { book }
            | Reference::Chapter { book, .. }
            | Reference::Verse { book, .. } => Some(book),
        }
    }

    /// Parses `s` as a reference at `level` and checks it against the structure
    /// table: the book must exist and chapter/verse numbers must be in range.
    pub fn parse(
        level: Level,
        s: &str,
        structure: &dyn StructureLookup,
    ) -> Result<Reference, ReferenceError> {
        let reference: Reference = s.parse().map_err(|_| malformed(s, level))?;
        if reference.level() != level {
            return Err(malformed(s, level));
        }

        if let Some(code) = reference.book_code() {
            let book = structure
                .book(code)
                .ok_or_else(|| ReferenceError::UnknownBook(code.to_string()))?;

            let in_range = match &reference {
                Reference::Chapter { chapter, .. } => book.verse_count(*chapter) > 0,
                Reference::Verse { chapter, verse, .. } => {
                    *verse >= 1 && *verse <= book.verse_count(*chapter)
                }
                _ => true,
            };
            if !in_range {
                return Err(ReferenceError::OutOfRange(s.to_string()));
            }
        }

        Ok(reference)
    }

    /// The reference one level up. Books resolve to their testament through the
    /// structure table.
    pub fn parent(&self, structure: &dyn StructureLookup) -> Option<Reference> {
        match self {
            Reference::Testament(_) => None,
            Reference::Book { book } => structure
                .book(book)
                .map(|b| Reference::Testament(b.testament)),
            Reference::Chapter { book, .. } => Some(Reference::Book { book: book.clone() }),
            Reference::Verse { book, chapter, .. } => Some(Reference::Chapter {
                book: book.clone(),
                chapter: *chapter,
            }),
        }
    }

    /// 1-based index of this unit among its siblings, i.e. which letter of the
    /// parent acrostic it corresponds to.
    pub fn ordinal(&self, structure: &dyn StructureLookup) -> Option<usize> {
        match self {
            Reference::Testament(_) => None,
            Reference::Book { book } => structure.book_position(book),
            Reference::Chapter { chapter, .. } => Some(*chapter),
            Reference::Verse { verse, .. } => Some(*verse),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reference::Testament(t) => write!(f, "{}", t),
            Reference::Book { book } => write!(f, "{}", book),
            Reference::Chapter { book, chapter } => write!(f, "{}.{}", book, chapter),
            Reference::Verse {
                book,
                chapter,
                verse,
            } => write!(f, "{}.{}.{}", book, chapter, verse),
        }
    }
}

/// Syntactic parse only; the level is inferred from the number of segments.
impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Reference, Self::Err> {
        let syntax = || ReferenceError::Syntax(s.to_string());

        if let Some(testament) = Testament::from_code(s) {
            return Ok(Reference::Testament(testament));
        }

        let segments: Vec<&str> = s.split('.').collect();
        let book = segments[0];
        if book.is_empty() || !book.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(syntax());
        }
        let book = book.to_string();

        match &segments[1..] {
            [] => Ok(Reference::Book { book }),
            [chapter] => Ok(Reference::Chapter {
                book,
                chapter: parse_number(chapter).ok_or_else(syntax)?,
            }),
            [chapter, verse] => Ok(Reference::Verse {
                book,
                chapter: parse_number(chapter).ok_or_else(syntax)?,
                verse: parse_number(verse).ok_or_else(syntax)?,
            }),
            _ => Err(syntax()),
        }
    }
}

fn parse_number(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn malformed(s: &str, level: Level) -> ReferenceError {
    ReferenceError::Malformed {
        reference: s.to_string(),
        level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::KjvStructure;

    #[test]
    fn from_str() {
        vec![
            ("OT", Reference::Testament(Testament::OT)),
            ("NT", Reference::Testament(Testament::NT)),
            (
                "GEN",
                Reference::Book {
                    book: "GEN".to_string(),
                },
            ),
            (
                "1CO.13",
                Reference::Chapter {
                    book: "1CO".to_string(),
                    chapter: 13,
                },
            ),
            (
                "JHN.3.16",
                Reference::Verse {
                    book: "JHN".to_string(),
                    chapter: 3,
                    verse: 16,
                },
            ),
        ]
        .into_iter()
        .for_each(|(raw, expected)| {
            let parsed: Reference = raw.parse().unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.to_string(), raw);
        });
    }

    #[test]
    fn from_str_rejects_garbage() {
        for raw in ["", ".", "GEN.", "GEN..1", "GEN.a", "GEN.1.2.3", "GE N", "GEN.-1"] {
            assert!(raw.parse::<Reference>().is_err(), "{:?}", raw);
        }
    }

    #[test]
    fn parse_checks_level_and_table() {
        let s = KjvStructure::new();

        assert!(Reference::parse(Level::Testament, "OT", &s).is_ok());
        assert!(Reference::parse(Level::Book, "GEN", &s).is_ok());
        assert!(Reference::parse(Level::Chapter, "GEN.50", &s).is_ok());
        assert!(Reference::parse(Level::Verse, "PSA.119.176", &s).is_ok());

        assert_eq!(
            Reference::parse(Level::Chapter, "GEN", &s),
            Err(ReferenceError::Malformed {
                reference: "GEN".to_string(),
                level: Level::Chapter,
            })
        );
        assert_eq!(
            Reference::parse(Level::Book, "XYZ", &s),
            Err(ReferenceError::UnknownBook("XYZ".to_string()))
        );
        assert_eq!(
            Reference::parse(Level::Chapter, "GEN.51", &s),
            Err(ReferenceError::OutOfRange("GEN.51".to_string()))
        );
        assert_eq!(
            Reference::parse(Level::Verse, "GEN.1.32", &s),
            Err(ReferenceError::OutOfRange("GEN.1.32".to_string()))
        );
        assert_eq!(
            Reference::parse(Level::Verse, "GEN.1.0", &s),
            Err(ReferenceError::OutOfRange("GEN.1.0".to_string()))
        );
    }

    #[test]
    fn parent_and_ordinal() {
        let s = KjvStructure::new();

        let verse: Reference = "GEN.1.3".parse().unwrap();
        assert_eq!(verse.parent(&s), Some("GEN.1".parse().unwrap()));
        assert_eq!(verse.ordinal(&s), Some(3));

        let book: Reference = "MAT".parse().unwrap();
        assert_eq!(book.parent(&s), Some(Reference::Testament(Testament::NT)));
        assert_eq!(book.ordinal(&s), Some(1));

        let testament = Reference::Testament(Testament::OT);
        assert_eq!(testament.parent(&s), None);
        assert_eq!(testament.ordinal(&s), None);
    }
}
