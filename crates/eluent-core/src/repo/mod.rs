//! The repository: one loaded snapshot of a `.eluent/` directory, with its
//! derived index, as the unit the rest of the crate operates on.

pub mod jsonl;
pub mod lock;

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::EluentError;
use crate::index::Indexer;
use crate::model::types::{AtomId, CommentId, RepoName};
use crate::model::{Atom, Bond, Comment};
use jsonl::{Header, Record};

const DATA_FILE: &str = "data.jsonl";
const EPHEMERAL_FILE: &str = "ephemeral.jsonl";

/// Which of the two JSONL files an atom's writes land in. `Primary` is
/// synced via git; `Ephemeral` is local-only and gitignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileClass {
    /// `.eluent/data.jsonl`.
    Primary,
    /// `.eluent/ephemeral.jsonl`.
    Ephemeral,
}

/// One loaded `.eluent/` directory: the in-memory atoms/bonds/comments,
/// their derived [`Indexer`], and enough bookkeeping to route a write back
/// to the file it came from.
pub struct Repository {
    root: PathBuf,
    repo_name: RepoName,
    index: Indexer,
    file_of_atom: std::collections::BTreeMap<AtomId, FileClass>,
}

impl Repository {
    fn data_path(&self) -> PathBuf {
        self.root.join(DATA_FILE)
    }

    fn ephemeral_path(&self) -> PathBuf {
        self.root.join(EPHEMERAL_FILE)
    }

    /// Load (creating empty files with headers if absent) the repository
    /// rooted at `eluent_dir` (normally `<repo_root>/.eluent`).
    ///
    /// # Errors
    /// Returns an error if either JSONL file cannot be read.
    pub fn open(eluent_dir: &Path, repo_name: RepoName) -> Result<Self, EluentError> {
        std::fs::create_dir_all(eluent_dir)?;
        let data_path = eluent_dir.join(DATA_FILE);
        let ephemeral_path = eluent_dir.join(EPHEMERAL_FILE);

        jsonl::write_header_if_absent(
            &data_path,
            Header {
                repo_name: repo_name.as_str().to_owned(),
                generator: generator_string(),
                created_at: Utc::now(),
            },
        )?;
        jsonl::write_header_if_absent(
            &ephemeral_path,
            Header {
                repo_name: repo_name.as_str().to_owned(),
                generator: generator_string(),
                created_at: Utc::now(),
            },
        )?;

        let mut repo = Self {
            root: eluent_dir.to_owned(),
            repo_name,
            index: Indexer::new(),
            file_of_atom: std::collections::BTreeMap::new(),
        };
        repo.reload()?;
        Ok(repo)
    }

    /// Re-read both JSONL files from disk and rebuild the index. The file
    /// on disk is authoritative; this discards any unsaved in-memory
    /// changes (there should be none, since every mutation method writes
    /// through immediately).
    ///
    /// # Errors
    /// Returns an error if either file cannot be read.
    pub fn reload(&mut self) -> Result<(), EluentError> {
        let data = jsonl::load(&self.data_path())?;
        let ephemeral = jsonl::load(&self.ephemeral_path())?;

        let mut atoms = Vec::new();
        let mut bonds = Vec::new();
        let mut comments = Vec::new();
        self.file_of_atom.clear();

        for record in data.records {
            match record {
                Record::Header(_) => {}
                Record::Atom(atom) => {
                    self.file_of_atom.insert(atom.id.clone(), FileClass::Primary);
                    atoms.push(atom);
                }
                Record::Bond(bond) => bonds.push(bond),
                Record::Comment(comment) => comments.push(comment),
            }
        }
        for record in ephemeral.records {
            match record {
                Record::Header(_) => {}
                Record::Atom(atom) => {
                    self.file_of_atom.insert(atom.id.clone(), FileClass::Ephemeral);
                    atoms.push(atom);
                }
                Record::Bond(bond) => bonds.push(bond),
                Record::Comment(comment) => comments.push(comment),
            }
        }

        self.index.rebuild(atoms, bonds, comments);
        Ok(())
    }

    /// The derived index for read operations.
    #[must_use]
    pub const fn index(&self) -> &Indexer {
        &self.index
    }

    /// This repository's sanitised name.
    #[must_use]
    pub const fn repo_name(&self) -> &RepoName {
        &self.repo_name
    }

    /// Create a new atom, appending it to the requested file class.
    /// Regenerates the ID if a randomly-assigned ID collides with an
    /// existing one (should only happen under the file class's
    /// `AtomId::generate` path, and then only astronomically rarely).
    ///
    /// # Errors
    /// Propagates any I/O error from the append.
    pub fn create_atom(&mut self, mut atom: Atom, file: FileClass) -> Result<Atom, EluentError> {
        while self.index.find_by_id(&atom.id).is_some() {
            tracing::warn!(id = %atom.id, "atom id collision, regenerating");
            atom.id = AtomId::generate(self.repo_name.clone());
        }
        let path = match file {
            FileClass::Primary => self.data_path(),
            FileClass::Ephemeral => self.ephemeral_path(),
        };
        jsonl::append(&path, &Record::Atom(atom.clone()))?;
        self.file_of_atom.insert(atom.id.clone(), file);
        self.index.index_atom(atom.clone());
        Ok(atom)
    }

    /// Apply `mutate` to the atom identified by `id` and rewrite whichever
    /// file it lives in (ephemeral first, per §4.3's find-file-for-atom
    /// rule) with the updated record.
    ///
    /// # Errors
    /// Returns [`EluentError::AtomNotFound`] if `id` is unknown, or
    /// propagates any I/O error from the rewrite.
    pub fn update_atom(
        &mut self,
        id: &AtomId,
        mutate: impl FnOnce(&mut Atom),
    ) -> Result<Atom, EluentError> {
        let mut atom = self
            .index
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| EluentError::AtomNotFound { id: id.to_string() })?;
        mutate(&mut atom);
        atom.updated_at = atom.updated_at.max(Utc::now());
        atom.validate_times()?;

        let file = self.file_of_atom.get(id).copied().unwrap_or(FileClass::Primary);
        self.rewrite_atom_in_file(id, &atom, file)?;
        self.index.index_atom(atom.clone());
        Ok(atom)
    }

    fn rewrite_atom_in_file(
        &self,
        id: &AtomId,
        updated: &Atom,
        file: FileClass,
    ) -> Result<(), EluentError> {
        let path = match file {
            FileClass::Primary => self.data_path(),
            FileClass::Ephemeral => self.ephemeral_path(),
        };
        let loaded = jsonl::load(&path)?;
        let records: Vec<Record> = loaded
            .records
            .into_iter()
            .map(|record| match record {
                Record::Atom(a) if &a.id == id => Record::Atom(updated.clone()),
                other => other,
            })
            .collect();
        jsonl::rewrite(&path, &records)?;
        Ok(())
    }

    /// Append a bond, rejecting a duplicate `(source, target, type)`
    /// identity silently (bonds are immutable and set-like).
    ///
    /// # Errors
    /// Returns [`EluentError::BondCycle`] if `bond` is blocking and an
    /// existing path from its target back to its source would close a
    /// loop. Propagates any I/O error from the append.
    pub fn add_bond(&mut self, bond: Bond) -> Result<(), EluentError> {
        let already_present = self
            .index
            .bonds_from(&bond.source_id)
            .iter()
            .any(|b| b.identity() == bond.identity());
        if already_present {
            return Ok(());
        }
        if bond.dependency_type.is_blocking()
            && matches!(
                crate::graph::cycle::check(&self.index, &bond.source_id, &bond.target_id, bond.dependency_type),
                crate::graph::cycle::CycleCheck::Cycle(_)
            )
        {
            return Err(EluentError::BondCycle {
                from: bond.source_id.to_string(),
                to: bond.target_id.to_string(),
            });
        }
        jsonl::append(&self.data_path(), &Record::Bond(bond.clone()))?;
        self.index.index_bond(bond);
        Ok(())
    }

    /// Append a comment, minting the next sequence number for its parent
    /// atom.
    ///
    /// # Errors
    /// Propagates any I/O error from the append.
    pub fn add_comment(
        &mut self,
        parent_id: AtomId,
        author: impl Into<String>,
        content: &str,
    ) -> Result<Comment, EluentError> {
        let next_seq = u32::try_from(self.index.comments_for(&parent_id).len())
            .unwrap_or(u32::MAX)
            + 1;
        let comment = Comment::new(
            CommentId::new(parent_id.clone(), next_seq),
            parent_id,
            author,
            content,
            Utc::now(),
        )?;
        jsonl::append(&self.data_path(), &Record::Comment(comment.clone()))?;
        self.index.index_comment(comment.clone());
        Ok(comment)
    }
}

pub(crate) fn generator_string() -> String {
    format!("eluent/{}", env!("CARGO_PKG_VERSION"))
}
