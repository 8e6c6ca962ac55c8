use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app::{NotifierError, Result};
use crate::store::write_atomic;

/// Durable set of post ids that have already been delivered.
///
/// Persisted as a JSON array in delivery order. Ids are never removed; an
/// operator resets the ledger by deleting the file, which puts the next run
/// back into first-run seeding.
#[derive(Debug)]
pub struct NotifiedLedger {
    path: PathBuf,
    ids: Vec<String>,
    index: HashSet<String>,
}

impl NotifiedLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ids: Vec<String> = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                NotifierError::Config(format!(
                    "Notified ledger at {} is corrupt: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut ledger = Self {
            path,
            ids: Vec::with_capacity(ids.len()),
            index: HashSet::with_capacity(ids.len()),
        };
        for id in ids {
            ledger.insert(id);
        }
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True until the ledger has been persisted for the first time.
    pub fn is_first_run(&self) -> bool {
        !self.path.exists()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Record a delivered id and persist before returning.
    ///
    /// Returns `false` (and writes nothing) when the id was already present.
    pub fn add(&mut self, id: &str) -> Result<bool> {
        if !self.insert(id.to_string()) {
            return Ok(false);
        }
        self.persist()?;
        debug!(id, total = self.ids.len(), "Marked post as notified");
        Ok(true)
    }

    /// Establish the baseline on first run: record every id and write the
    /// file once, even when `ids` is empty.
    pub fn seed<I, S>(&mut self, ids: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for id in ids {
            if self.insert(id.into()) {
                added += 1;
            }
        }
        self.persist()?;
        Ok(added)
    }

    fn insert(&mut self, id: String) -> bool {
        if self.index.contains(&id) {
            return false;
        }
        self.index.insert(id.clone());
        self.ids.push(id);
        true
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_vec(&self.ids)?;
        write_atomic(&self.path, &json)
    }
}
