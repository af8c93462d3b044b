//! Generation history journal
//!
//! Every generation run is stored as a [`GenerationRecord`] holding the full
//! text of each file it wrote, so a run can be replayed file-for-file later.
//! The journal is a single pretty-printed JSON array at
//! `<history dir>/history.json`, kept sorted by creation time.
//!
//! Writers serialize on an advisory lock (`history.json.lock`), reload the
//! file under the lock, and replace it atomically. Readers take no lock.

use crate::artifacts::ArtifactKind;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const DEFAULT_HISTORY_DIR: &str = ".gen_history";
pub const JOURNAL_FILE: &str = "history.json";

/// SHA-256 of `content`, lowercase hex
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Record-level checksum over the file checksums, in file order
fn record_checksum(files: &[GeneratedFile]) -> String {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.checksum.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// One artifact as it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedFile {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    /// Byte-identical to what was written
    pub content: String,
    pub checksum: String,
    #[schemars(with = "String")]
    pub created_at: DateTime<Utc>,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            kind,
            checksum: checksum(&content),
            content,
            created_at: Utc::now(),
        }
    }

    /// Whether the stored checksum still matches the stored content.
    pub fn is_intact(&self) -> bool {
        checksum(&self.content) == self.checksum
    }
}

/// Settings a run was made with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub output: String,
    pub web_output: String,
    pub package: String,
    pub features: Vec<String>,
    pub layer_mode: String,
    pub with_test: bool,
}

/// One generation run. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationRecord {
    /// ULID, time-ordered
    pub id: String,
    pub table: String,
    pub module: String,
    #[schemars(with = "String")]
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub table_comment: String,
    pub field_count: usize,
    #[serde(default)]
    pub config: ConfigSnapshot,
    pub files: Vec<GeneratedFile>,
    pub checksum: String,
}

impl GenerationRecord {
    pub fn new(
        table: impl Into<String>,
        module: impl Into<String>,
        table_comment: impl Into<String>,
        field_count: usize,
        config: ConfigSnapshot,
        files: Vec<GeneratedFile>,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            table: table.into(),
            module: module.into(),
            generated_at: Utc::now(),
            table_comment: table_comment.into(),
            field_count,
            config,
            checksum: record_checksum(&files),
            files,
        }
    }

    /// Every file checksum and the record checksum match the stored content.
    pub fn is_intact(&self) -> bool {
        self.files.iter().all(GeneratedFile::is_intact) && record_checksum(&self.files) == self.checksum
    }
}

/// Rollback behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackOptions {
    /// Refuse with [`Error::Drift`] if any existing file differs from the
    /// record. Off by default: rollback overwrites unconditionally.
    pub check_drift: bool,
}

/// What a rollback restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub record_id: String,
    pub restored: Vec<PathBuf>,
}

/// Exclusive advisory lock, released on drop
struct JournalLock {
    file: File,
}

impl JournalLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = File::options()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock()?;
        Ok(Self { file })
    }
}

impl Drop for JournalLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Handle on a journal directory
#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DIR)
    }
}

impl Journal {
    /// No I/O happens until the journal is read or written.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", JOURNAL_FILE))
    }

    /// All records in storage order. A missing journal is empty.
    pub fn list(&self) -> Result<Vec<GenerationRecord>> {
        let path = self.path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| Error::JournalCorrupt { path, source })
    }

    pub fn find(&self, id: &str) -> Result<Option<GenerationRecord>> {
        Ok(self.list()?.into_iter().find(|r| r.id == id))
    }

    /// Like [`Journal::find`], but a missing id is an error.
    pub fn get(&self, id: &str) -> Result<GenerationRecord> {
        self.find(id)?
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))
    }

    pub fn records_for_table(&self, table: &str) -> Result<Vec<GenerationRecord>> {
        Ok(self.list()?.into_iter().filter(|r| r.table == table).collect())
    }

    /// Most recent record, if any
    pub fn latest(&self) -> Result<Option<GenerationRecord>> {
        Ok(self.list()?.pop())
    }

    /// Insert a record and persist the set sorted by creation time.
    pub fn append(&self, record: GenerationRecord) -> Result<()> {
        let id = record.id.clone();
        let table = record.table.clone();
        self.update(|records| {
            if records.iter().any(|r| r.id == record.id) {
                return Err(Error::Config(format!(
                    "journal already holds a record with id {}",
                    record.id
                )));
            }
            records.push(record);
            records.sort_by_key(|r| r.generated_at);
            Ok(())
        })?;
        tracing::info!(record = %id, table = %table, journal = %self.path().display(), "appended generation record");
        Ok(())
    }

    /// Remove one record.
    pub fn delete(&self, id: &str) -> Result<GenerationRecord> {
        let removed = self.update(|records| {
            let pos = records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;
            Ok(records.remove(pos))
        })?;
        tracing::info!(record = %id, "deleted generation record");
        Ok(removed)
    }

    /// Drop every record; returns how many there were.
    pub fn clear(&self) -> Result<usize> {
        let count = self.update(|records| {
            let count = records.len();
            records.clear();
            Ok(count)
        })?;
        tracing::info!(removed = count, "cleared generation history");
        Ok(count)
    }

    /// Restore every file of a record to its stored content.
    pub fn rollback(&self, id: &str) -> Result<RollbackReport> {
        self.rollback_with(id, RollbackOptions::default())
    }

    pub fn rollback_with(&self, id: &str, options: RollbackOptions) -> Result<RollbackReport> {
        let record = self.get(id)?;

        let drifted = drifted_files(&record);
        if !drifted.is_empty() {
            if options.check_drift {
                return Err(Error::Drift {
                    record: record.id,
                    paths: drifted,
                });
            }
            tracing::warn!(record = %record.id, files = drifted.len(), "rollback overwrites files changed since generation");
        }

        let mut restored = Vec::with_capacity(record.files.len());
        for file in &record.files {
            if let Some(parent) = file.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&file.path, &file.content)?;
            tracing::debug!(path = %file.path.display(), "restored file");
            restored.push(file.path.clone());
        }

        tracing::info!(record = %record.id, files = restored.len(), "rollback finished");
        Ok(RollbackReport {
            record_id: record.id,
            restored,
        })
    }

    /// Read-modify-write under the journal lock.
    fn update<T>(&self, f: impl FnOnce(&mut Vec<GenerationRecord>) -> Result<T>) -> Result<T> {
        std::fs::create_dir_all(&self.dir)?;
        let _lock = JournalLock::acquire(&self.lock_path())?;
        let mut records = self.list()?;
        let out = f(&mut records)?;
        self.write_atomic(&records)?;
        Ok(out)
    }

    fn write_atomic(&self, records: &[GenerationRecord]) -> Result<()> {
        let path = self.path();
        let tmp = self
            .dir
            .join(format!("{}.tmp.{}", JOURNAL_FILE, std::process::id()));
        let json = serde_json::to_string_pretty(records)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Existing files whose on-disk content no longer matches the record.
/// Files that are gone are not counted: restoring them loses nothing.
pub fn drifted_files(record: &GenerationRecord) -> Vec<PathBuf> {
    record
        .files
        .iter()
        .filter(|file| match std::fs::read_to_string(&file.path) {
            Ok(current) => checksum(&current) != file.checksum,
            Err(e) => e.kind() != std::io::ErrorKind::NotFound,
        })
        .map(|file| file.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn record_at(table: &str, secs: i64, files: Vec<GeneratedFile>) -> GenerationRecord {
        let mut record = GenerationRecord::new(table, "sys", "", 4, ConfigSnapshot::default(), files);
        record.generated_at = Utc.timestamp_opt(secs, 0).unwrap();
        record
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(checksum("X"), checksum("X"));
        assert_ne!(checksum("X"), checksum("Y"));
    }

    #[test]
    fn test_missing_journal_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("never-created"));
        assert!(journal.list().unwrap().is_empty());
        assert!(journal.latest().unwrap().is_none());
    }

    #[test]
    fn test_malformed_journal_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(JOURNAL_FILE), "{ not json").unwrap();
        let err = Journal::new(dir.path()).list().unwrap_err();
        assert!(matches!(err, Error::JournalCorrupt { .. }));
    }

    #[test]
    fn test_append_sorts_by_creation_time() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        for (table, secs) in [("b", 200), ("c", 300), ("a", 100)] {
            journal.append(record_at(table, secs, vec![])).unwrap();
        }
        let tables: Vec<_> = journal.list().unwrap().into_iter().map(|r| r.table).collect();
        assert_eq!(tables, ["a", "b", "c"]);
        assert_eq!(journal.latest().unwrap().unwrap().table, "c");
        assert!(!dir.path().join(format!("{}.tmp.{}", JOURNAL_FILE, std::process::id())).exists());
    }

    #[test]
    fn test_append_rejects_duplicate_id() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        let record = record_at("sys_user", 10, vec![]);
        journal.append(record.clone()).unwrap();

        let mut again = record_at("sys_dept", 20, vec![]);
        again.id = record.id.clone();
        assert!(matches!(journal.append(again), Err(Error::Config(_))));
        assert_eq!(journal.list().unwrap(), vec![record]);
    }

    #[test]
    fn test_records_for_table_delete_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path());
        let first = record_at("sys_user", 1, vec![]);
        let first_id = first.id.clone();
        journal.append(first).unwrap();
        journal.append(record_at("sys_dept", 2, vec![])).unwrap();
        journal.append(record_at("sys_user", 3, vec![])).unwrap();

        assert_eq!(journal.records_for_table("sys_user").unwrap().len(), 2);

        let removed = journal.delete(&first_id).unwrap();
        assert_eq!(removed.id, first_id);
        assert!(journal.find(&first_id).unwrap().is_none());
        assert!(matches!(journal.delete(&first_id), Err(Error::RecordNotFound(_))));

        assert_eq!(journal.clear().unwrap(), 2);
        assert!(journal.list().unwrap().is_empty());
    }

    #[test]
    fn test_rollback_restores_exact_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/user.rs");
        let journal = Journal::new(dir.path().join("history"));
        let record = record_at("sys_user", 1, vec![GeneratedFile::new(&target, ArtifactKind::Backend, "X")]);
        let id = record.id.clone();
        let h = record.files[0].checksum.clone();
        journal.append(record).unwrap();

        // Parent directories are recreated.
        let report = journal.rollback(&id).unwrap();
        assert_eq!(report.restored, vec![target.clone()]);
        let restored = std::fs::read_to_string(&target).unwrap();
        assert_eq!(restored, "X");
        assert_eq!(checksum(&restored), h);

        // Default rollback clobbers local edits.
        std::fs::write(&target, "edited").unwrap();
        journal.rollback(&id).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "X");
    }

    #[test]
    fn test_rollback_drift_check() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("user.rs");
        let journal = Journal::new(dir.path().join("history"));
        let record = record_at("sys_user", 1, vec![GeneratedFile::new(&target, ArtifactKind::Backend, "X")]);
        let id = record.id.clone();
        journal.append(record).unwrap();

        std::fs::write(&target, "edited").unwrap();
        let err = journal
            .rollback_with(&id, RollbackOptions { check_drift: true })
            .unwrap_err();
        assert!(matches!(err, Error::Drift { ref paths, .. } if paths == &vec![target.clone()]));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "edited");

        std::fs::remove_file(&target).unwrap();
        journal
            .rollback_with(&id, RollbackOptions { check_drift: true })
            .unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "X");
    }

    #[test]
    fn test_rollback_unknown_id_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("history"));
        let err = journal.rollback("01J0000000000000000000000").unwrap_err();
        assert!(matches!(err, Error::RecordNotFound(_)));
        assert!(!journal.dir().exists());
    }

    #[test]
    fn test_record_integrity() {
        let mut record = record_at(
            "sys_user",
            1,
            vec![
                GeneratedFile::new("a.rs", ArtifactKind::Backend, "a"),
                GeneratedFile::new("b.ts", ArtifactKind::Frontend, "b"),
            ],
        );
        assert!(record.is_intact());
        record.files[1].content.push('!');
        assert!(!record.is_intact());
    }

    #[test]
    fn test_record_json_shape() {
        let record = record_at("sys_user", 1, vec![GeneratedFile::new("a.sql", ArtifactKind::Provisioning, "x")]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["files"][0]["type"], "provisioning");
        assert_eq!(json["table"], "sys_user");
        assert_eq!(record.id.len(), 26);
    }
}
