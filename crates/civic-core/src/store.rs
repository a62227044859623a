//! JSONL record store for civic issues
//!
//! One JSON document per line, rewritten after every mutation. Every
//! operation runs under a single lock, so each one is atomic with respect to
//! the others and a document is never half-updated.

use crate::{Error, Issue, Result};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const ISSUES_FILE: &str = "issues.jsonl";

/// Documents plus their insertion order
#[derive(Default)]
struct Documents {
    issues: HashMap<String, Issue>,
    order: Vec<String>,
}

impl Documents {
    fn put(&mut self, issue: Issue) {
        if !self.issues.contains_key(&issue.id) {
            self.order.push(issue.id.clone());
        }
        self.issues.insert(issue.id.clone(), issue);
    }

    fn remove(&mut self, id: &str) {
        if self.issues.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
        }
    }

    fn ordered(&self) -> impl Iterator<Item = &Issue> {
        self.order.iter().filter_map(|id| self.issues.get(id))
    }
}

/// JSONL-backed issue store
pub struct Store {
    /// None for a purely in-memory store
    path: Option<PathBuf>,
    docs: RwLock<Documents>,
}

impl Store {
    /// Open (or create) the store in `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(ISSUES_FILE);
        let docs = Self::load(&path)?;
        Ok(Self {
            path: Some(path),
            docs: RwLock::new(docs),
        })
    }

    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            docs: RwLock::new(Documents::default()),
        }
    }

    /// Path to issues.jsonl, if file backed
    pub fn issues_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn load(path: &Path) -> Result<Documents> {
        let mut docs = Documents::default();
        if !path.exists() {
            return Ok(docs);
        }

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let issue: Issue = serde_json::from_str(&line).map_err(|e| {
                Error::Storage(format!("{}:{}: {}", path.display(), lineno + 1, e))
            })?;
            docs.put(issue);
        }

        Ok(docs)
    }

    /// Rewrite issues.jsonl in insertion order, via a temp file + rename
    fn save(&self, docs: &Documents) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("jsonl.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            for issue in docs.ordered() {
                serde_json::to_writer(&mut writer, issue)?;
                writeln!(writer)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Documents>> {
        self.docs
            .read()
            .map_err(|_| Error::Storage("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Documents>> {
        self.docs
            .write()
            .map_err(|_| Error::Storage("store lock poisoned".into()))
    }

    /// Insert a new issue
    pub fn insert(&self, issue: Issue) -> Result<()> {
        let mut docs = self.write()?;
        if docs.issues.contains_key(&issue.id) {
            return Err(Error::AlreadyExists(issue.id));
        }
        let id = issue.id.clone();
        docs.put(issue);
        if let Err(e) = self.save(&docs) {
            docs.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    /// Get an issue by ID
    pub fn get(&self, id: &str) -> Result<Option<Issue>> {
        Ok(self.read()?.issues.get(id).cloned())
    }

    /// All issues in insertion order
    pub fn list(&self) -> Result<Vec<Issue>> {
        Ok(self.read()?.ordered().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.issues.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Flip `user_id`'s upvote on one issue as a single atomic step
    pub fn toggle_upvote(&self, id: &str, user_id: &str) -> Result<Issue> {
        self.modify(id, |issue| {
            issue.toggle_upvote(user_id);
        })
    }

    /// Replace an issue only if the stored version still equals
    /// `expected_version`
    pub fn replace_if_version(&self, issue: Issue, expected_version: u64) -> Result<Issue> {
        let mut docs = self.write()?;
        let current = docs
            .issues
            .get(&issue.id)
            .ok_or_else(|| Error::NotFound(issue.id.clone()))?;
        if current.version != expected_version {
            return Err(Error::Conflict(issue.id));
        }
        let previous = current.clone();
        docs.put(issue.clone());
        if let Err(e) = self.save(&docs) {
            docs.put(previous);
            return Err(e);
        }
        Ok(issue)
    }

    /// Mutate one document under the write lock, rolling back if the write
    /// to disk fails
    fn modify(&self, id: &str, f: impl FnOnce(&mut Issue)) -> Result<Issue> {
        let mut docs = self.write()?;
        let issue = docs
            .issues
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let previous = issue.clone();
        f(issue);
        let updated = issue.clone();
        if let Err(e) = self.save(&docs) {
            docs.put(previous);
            return Err(e);
        }
        Ok(updated)
    }
}
