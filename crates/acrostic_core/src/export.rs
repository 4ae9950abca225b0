//! crates/acrostic_core/src/export.rs
//!
//! Compiles the canonical export: one nested document holding the official
//! mnemonic for every testament, book, chapter and verse that has one.
//!
//! Pruning: a verse appears only with a canonical branch; a chapter appears if
//! it has its own branch or at least one verse; a book appears if it has its
//! own branch or at least one chapter. Ancestors kept only for their
//! descendants carry `mnemonic: null`.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{Branch, BranchFilter, Testament};
use crate::ports::{BranchStore, PortResult, StructureLookup};

pub const EXPORT_DESCRIPTION: &str =
    "Canonical acrostic mnemonics for Scripture memorization, compiled from official branches";

//=========================================================================================
// Export Document
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub meta: ExportMeta,
    pub testaments: TestamentsExport,
    pub books: BTreeMap<String, BookExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMeta {
    pub version: String,
    pub description: String,
    pub generated_at: DateTime<Utc>,
}

impl ExportMeta {
    pub fn new(version: &str, generated_at: DateTime<Utc>) -> Self {
        Self {
            version: version.to_string(),
            description: EXPORT_DESCRIPTION.to_string(),
            generated_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestamentsExport {
    #[serde(rename = "OT", default, skip_serializing_if = "Option::is_none")]
    pub ot: Option<MnemonicExport>,
    #[serde(rename = "NT", default, skip_serializing_if = "Option::is_none")]
    pub nt: Option<MnemonicExport>,
}

impl TestamentsExport {
    pub fn get(&self, testament: Testament) -> Option<&MnemonicExport> {
        match testament {
            Testament::OT => self.ot.as_ref(),
            Testament::NT => self.nt.as_ref(),
        }
    }

    fn set(&mut self, testament: Testament, entry: MnemonicExport) {
        match testament {
            Testament::OT => self.ot = Some(entry),
            Testament::NT => self.nt = Some(entry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MnemonicExport {
    pub mnemonic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookExport {
    pub mnemonic: Option<String>,
    #[serde(default)]
    pub chapters: BTreeMap<usize, ChapterExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterExport {
    pub mnemonic: Option<String>,
    #[serde(default)]
    pub verses: BTreeMap<usize, MnemonicExport>,
}

//=========================================================================================
// Compilation
//=========================================================================================

/// Builds the export from a set of canonical branches.
///
/// Should two canonical branches share a reference, the first one in `canonical`
/// wins and the others are logged. Branches whose reference is not reachable
/// through the structure table are ignored.
pub fn compile_export(
    structure: &dyn StructureLookup,
    canonical: Vec<Branch>,
    meta: ExportMeta,
) -> ExportDocument {
    let mut by_reference: HashMap<String, Branch> = HashMap::with_capacity(canonical.len());
    for branch in canonical {
        match by_reference.entry(branch.reference.clone()) {
            Entry::Occupied(kept) => warn!(
                reference = %branch.reference,
                kept = %kept.get().id,
                ignored = %branch.id,
                "More than one canonical branch for a reference"
            ),
            Entry::Vacant(slot) => {
                slot.insert(branch);
            }
        }
    }
    let mnemonic = |reference: &str| by_reference.get(reference).map(|b| b.content.clone());

    let mut testaments = TestamentsExport::default();
    let mut books = BTreeMap::new();

    for testament in Testament::ALL {
        if let Some(content) = mnemonic(testament.code()) {
            testaments.set(testament, MnemonicExport { mnemonic: content });
        }

        for book in structure.books(testament) {
            let mut chapters = BTreeMap::new();

            for chapter in 1..=book.chapter_count() {
                let verses: BTreeMap<usize, MnemonicExport> = (1..=book.verse_count(chapter))
                    .filter_map(|verse| {
                        mnemonic(&format!("{}.{}.{}", book.code, chapter, verse))
                            .map(|content| (verse, MnemonicExport { mnemonic: content }))
                    })
                    .collect();

                let chapter_mnemonic = mnemonic(&format!("{}.{}", book.code, chapter));
                if chapter_mnemonic.is_some() || !verses.is_empty() {
                    chapters.insert(
                        chapter,
                        ChapterExport {
                            mnemonic: chapter_mnemonic,
                            verses,
                        },
                    );
                }
            }

            let book_mnemonic = mnemonic(&book.code);
            if book_mnemonic.is_some() || !chapters.is_empty() {
                books.insert(
                    book.code.clone(),
                    BookExport {
                        mnemonic: book_mnemonic,
                        chapters,
                    },
                );
            }
        }
    }

    ExportDocument {
        meta,
        testaments,
        books,
    }
}

/// Queries the store for every canonical branch and compiles a fresh export.
///
/// A failed query fails the whole export; no partial document is produced.
pub async fn compile_from_store(
    store: &dyn BranchStore,
    structure: &dyn StructureLookup,
    version: &str,
) -> PortResult<ExportDocument> {
    let canonical: Vec<Branch> = store
        .find_branches(BranchFilter::canonical())
        .await?
        .into_iter()
        .map(|vb| vb.branch)
        .collect();
    info!("Compiling export from {} canonical branches", canonical.len());

    Ok(compile_export(
        structure,
        canonical,
        ExportMeta::new(version, Utc::now()),
    ))
}
