//! crates/acrostic_core/src/seed.rs
//!
//! Loads an export document back into a store, e.g. to bootstrap a fresh
//! database from a previously published export.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::domain::{Branch, Identity, Level, NewBranch, Testament};
use crate::export::ExportDocument;
use crate::ports::{BranchStore, PortResult, StructureLookup};
use crate::reference::Reference;
use crate::validation::{derive_letter_constraint, validate};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Inserts every mnemonic of `document` as a branch, top-down, linking each
/// entry to the branch just imported for its parent reference.
///
/// Entries that fail reference or acrostic validation are skipped and counted.
/// With `canonical` set, each imported branch becomes the canonical one for its
/// reference.
pub async fn import_document(
    store: &dyn BranchStore,
    structure: &dyn StructureLookup,
    identity: &Identity,
    document: &ExportDocument,
    canonical: bool,
) -> PortResult<ImportReport> {
    let mut report = ImportReport::default();
    let ctx = ImportContext {
        store,
        structure,
        identity,
        canonical,
    };

    let mut testaments: HashMap<Testament, Branch> = HashMap::new();
    for testament in Testament::ALL {
        if let Some(entry) = document.testaments.get(testament) {
            let imported = ctx
                .import_one(
                    &mut report,
                    Level::Testament,
                    testament.code().to_string(),
                    None,
                    &entry.mnemonic,
                )
                .await?;
            if let Some(branch) = imported {
                testaments.insert(testament, branch);
            }
        }
    }

    for (code, book) in &document.books {
        let Some(book_info) = structure.book(code) else {
            warn!("Skipping unknown book '{}' in import", code);
            report.skipped += 1;
            continue;
        };

        let book_branch = match &book.mnemonic {
            Some(content) => {
                ctx.import_one(
                    &mut report,
                    Level::Book,
                    code.clone(),
                    testaments.get(&book_info.testament),
                    content,
                )
                .await?
            }
            None => None,
        };

        for (chapter, chapter_entry) in &book.chapters {
            let chapter_ref = format!("{}.{}", code, chapter);
            let chapter_branch = match &chapter_entry.mnemonic {
                Some(content) => {
                    ctx.import_one(
                        &mut report,
                        Level::Chapter,
                        chapter_ref.clone(),
                        book_branch.as_ref(),
                        content,
                    )
                    .await?
                }
                None => None,
            };

            for (verse, verse_entry) in &chapter_entry.verses {
                ctx.import_one(
                    &mut report,
                    Level::Verse,
                    format!("{}.{}", chapter_ref, verse),
                    chapter_branch.as_ref(),
                    &verse_entry.mnemonic,
                )
                .await?;
            }
        }
    }

    info!(
        "Import finished: {} inserted, {} skipped",
        report.inserted, report.skipped
    );
    Ok(report)
}

struct ImportContext<'a> {
    store: &'a dyn BranchStore,
    structure: &'a dyn StructureLookup,
    identity: &'a Identity,
    canonical: bool,
}

impl ImportContext<'_> {
    async fn import_one(
        &self,
        report: &mut ImportReport,
        level: Level,
        reference: String,
        parent: Option<&Branch>,
        content: &str,
    ) -> PortResult<Option<Branch>> {
        let parsed = match Reference::parse(level, &reference, self.structure) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping {} entry: {}", level, e);
                report.skipped += 1;
                return Ok(None);
            }
        };

        let letter_constraint = parent.and_then(|p| {
            parsed
                .ordinal(self.structure)
                .and_then(|ordinal| derive_letter_constraint(&p.content, ordinal))
        });

        if let Err(e) = validate(self.structure, content, level, &reference, letter_constraint) {
            warn!("Skipping {} '{}': {}", level, reference, e);
            report.skipped += 1;
            return Ok(None);
        }

        let branch = self
            .store
            .insert_branch(NewBranch {
                level,
                reference,
                parent_branch_id: parent.map(|p| p.id),
                content: content.trim().to_string(),
                letter_constraint,
                is_canonical: false,
                created_by: self.identity.user_id,
            })
            .await?;
        let branch = if self.canonical {
            self.store.set_canonical(branch.id, true).await?
        } else {
            branch
        };

        report.inserted += 1;
        Ok(Some(branch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BranchFilter;
    use crate::export::{compile_export, BookExport, ChapterExport, ExportMeta, MnemonicExport};
    use crate::memory::InMemoryStore;
    use crate::structure::KjvStructure;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn admin() -> Identity {
        Identity {
            user_id: Uuid::new_v4(),
            is_admin: true,
        }
    }

    fn ruth_document() -> ExportDocument {
        let mut verses = BTreeMap::new();
        verses.insert(
            1,
            MnemonicExport {
                mnemonic: "Now it came to pass".to_string(),
            },
        );
        verses.insert(
            99,
            MnemonicExport {
                mnemonic: "out of range".to_string(),
            },
        );
        let mut chapters = BTreeMap::new();
        // RUT.1 has 22 verses, so 22 letters starting with the book's first letter.
        chapters.insert(
            1,
            ChapterExport {
                mnemonic: Some("Naomi went home with Orpah".to_string()),
                verses,
            },
        );
        let mut books = BTreeMap::new();
        books.insert(
            "RUT".to_string(),
            BookExport {
                mnemonic: Some("Nobz".to_string()),
                chapters,
            },
        );
        books.insert(
            "XYZ".to_string(),
            BookExport {
                mnemonic: Some("x".to_string()),
                chapters: BTreeMap::new(),
            },
        );

        ExportDocument {
            meta: ExportMeta::new("1.0", Utc::now()),
            testaments: Default::default(),
            books,
        }
    }

    #[tokio::test]
    async fn imports_valid_entries_and_links_parents() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();

        let report = import_document(&store, &structure, &admin(), &ruth_document(), false)
            .await
            .unwrap();
        assert_eq!(
            report,
            ImportReport {
                inserted: 3,
                skipped: 2
            }
        );

        let book = store
            .find_branches(BranchFilter {
                reference: Some("RUT".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let chapter = store
            .find_branches(BranchFilter {
                reference: Some("RUT.1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(chapter[0].branch.parent_branch_id, Some(book[0].branch.id));
        assert_eq!(chapter[0].branch.letter_constraint, Some('N'));
        assert!(!chapter[0].branch.is_canonical);
    }

    #[tokio::test]
    async fn wrong_first_letter_is_skipped() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();
        let mut document = ruth_document();
        // RUT is the eighth book of the OT.
        document.testaments.ot = Some(MnemonicExport {
            mnemonic: format!("{}N{}", "a".repeat(7), "a".repeat(31)),
        });
        if let Some(book) = document.books.get_mut("RUT") {
            book.mnemonic = Some("Zobz".to_string());
        }
        document.books.remove("XYZ");

        let report = import_document(&store, &structure, &admin(), &document, false)
            .await
            .unwrap();
        // The chapter still imports; its book was rejected so nothing constrains it.
        assert_eq!(
            report,
            ImportReport {
                inserted: 3,
                skipped: 2
            }
        );
        assert!(store
            .find_branches(BranchFilter {
                level: Some(Level::Book),
                ..Default::default()
            })
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn canonical_import_reproduces_the_export() {
        let store = InMemoryStore::new();
        let structure = KjvStructure::new();
        let mut document = ruth_document();
        document.books.remove("XYZ");
        if let Some(chapter) = document
            .books
            .get_mut("RUT")
            .and_then(|b| b.chapters.get_mut(&1))
        {
            chapter.verses.remove(&99);
        }

        import_document(&store, &structure, &admin(), &document, true)
            .await
            .unwrap();

        let canonical = store
            .find_branches(BranchFilter::canonical())
            .await
            .unwrap()
            .into_iter()
            .map(|vb| vb.branch)
            .collect();
        let rebuilt = compile_export(&structure, canonical, document.meta.clone());
        assert_eq!(rebuilt, document);
    }
}
