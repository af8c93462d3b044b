//! Journal persistence across handles and threads

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use tablegen::history::ConfigSnapshot;
use tablegen::{ArtifactKind, Error, GeneratedFile, GenerationRecord, Journal};

fn record(table: &str, dir: &std::path::Path) -> GenerationRecord {
    let file = GeneratedFile::new(
        dir.join(format!("{}.rs", table)),
        ArtifactKind::Backend,
        format!("// {}\n", table),
    );
    GenerationRecord::new(table, "sys", "", 1, ConfigSnapshot::default(), vec![file])
}

#[test]
fn test_concurrent_appends_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let history = Arc::new(dir.path().join("history"));
    let out = Arc::new(dir.path().join("out"));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let history = Arc::clone(&history);
            let out = Arc::clone(&out);
            thread::spawn(move || {
                let journal = Journal::new(history.as_path());
                for j in 0..5 {
                    journal.append(record(&format!("t{}_{}", i, j), &out)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = Journal::new(history.as_path()).list().unwrap();
    assert_eq!(records.len(), 40);
    assert!(records.windows(2).all(|w| w[0].generated_at <= w[1].generated_at));
    let mut ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 40);
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let first = record("sys_user", dir.path());
    let second = record("sys_dept", dir.path());

    let journal = Journal::new(dir.path().join("history"));
    journal.append(first.clone()).unwrap();
    journal.append(second.clone()).unwrap();

    let reopened = Journal::new(dir.path().join("history"));
    assert_eq!(reopened.get(&first.id).unwrap(), first);
    assert_eq!(reopened.records_for_table("sys_dept").unwrap(), vec![second.clone()]);

    reopened.delete(&first.id).unwrap();
    assert!(matches!(journal.get(&first.id), Err(Error::RecordNotFound(_))));
    assert_eq!(journal.clear().unwrap(), 1);
    assert!(journal.list().unwrap().is_empty());
}

#[test]
fn test_corrupt_journal_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::new(dir.path());
    std::fs::write(journal.path(), "{ not json").unwrap();

    assert!(matches!(journal.list(), Err(Error::JournalCorrupt { .. })));
    let err = journal.append(record("sys_user", dir.path())).unwrap_err();
    assert!(matches!(err, Error::JournalCorrupt { .. }));
    assert_eq!(std::fs::read_to_string(journal.path()).unwrap(), "{ not json");
}
