use super::*;
use crate::model::{Contact, LookupStatus};
use crate::secrets::MemoryStore;
use anyhow::Result;
use serde_json::json;
use tempfile::tempdir;

fn records() -> Vec<LookupRecord> {
    let at = "2026-02-04T10:00:00Z".parse().unwrap();
    let mut found = LookupRecord::pending("Redtail", "+1-555-456-7890", at);
    found.status = LookupStatus::Success;
    found.details = "1 contact found".into();
    found.results = vec![Contact::from_crm(
        json!({"id": 11, "first_name": "Ada", "phones": [{"number": "5554567890"}]}),
        "5554567890",
        at,
    )];

    let mut failed = LookupRecord::pending("Redtail", "555", at);
    failed.status = LookupStatus::Failed;
    failed.details = "CRM returned HTTP 500".into();

    vec![found, failed]
}

#[test]
fn save_then_load_reproduces_list() -> Result<()> {
    let dir = tempdir()?;
    let store = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));

    history.save(&store, &records())?;

    assert_eq!(history.load(&store)?, records());
    Ok(())
}

#[test]
fn file_is_not_plaintext() -> Result<()> {
    let dir = tempdir()?;
    let store = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));

    history.save(&store, &records())?;

    let bytes = fs::read(history.path())?;
    assert_eq!(bytes.len() % 16, 0);
    assert!(!String::from_utf8_lossy(&bytes).contains("Redtail"));
    Ok(())
}

#[test]
fn missing_file_loads_empty() -> Result<()> {
    let dir = tempdir()?;
    let history = HistoryStore::new(&dir.path().join("nope.bin"));

    assert!(history.load(&MemoryStore::new())?.is_empty());
    Ok(())
}

#[test]
fn key_is_generated_once_and_reused() -> Result<()> {
    let dir = tempdir()?;
    let store = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));

    history.save(&store, &records())?;
    let key = store.get(secrets::HISTORY_KEY)?;
    history.save(&store, &records()[..1])?;

    assert_eq!(store.get(secrets::HISTORY_KEY)?, key);
    assert_eq!(key.map(|k| k.len()), Some(KEY_LEN * 2));
    assert_eq!(history.load(&store)?.len(), 1);
    Ok(())
}

#[test]
fn lost_key_is_an_error_not_garbage() -> Result<()> {
    let dir = tempdir()?;
    let store = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));
    history.save(&store, &records())?;

    let fresh = MemoryStore::new();

    assert!(history.load(&fresh).is_err());
    Ok(())
}

#[test]
fn wrong_key_fails_to_load() -> Result<()> {
    let dir = tempdir()?;
    let store = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));
    history.save(&store, &records())?;

    store.set(secrets::HISTORY_KEY, &hex::encode([7u8; KEY_LEN]))?;

    assert!(history.load(&store).is_err());
    Ok(())
}

#[test]
fn save_creates_parent_directories() -> Result<()> {
    let dir = tempdir()?;
    let history = HistoryStore::new(&dir.path().join("nested").join("history.bin"));

    history.save(&MemoryStore::new(), &[])?;

    assert!(history.path().exists());
    Ok(())
}

#[test]
fn contact_with_clashing_keys_roundtrips() -> Result<()> {
    let dir = tempdir()?;
    let store = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));
    let mut list = records();
    list[0].results = vec![Contact::from_crm(
        json!({"id": 1, "received_at": "2020-01-01", "lookup_phone": "x"}),
        "5554567890",
        list[0].timestamp,
    )];

    history.save(&store, &list)?;

    assert_eq!(history.load(&store)?, list);
    Ok(())
}

#[test]
fn every_save_uses_a_fresh_iv() -> Result<()> {
    let dir = tempdir()?;
    let store = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));

    history.save(&store, &records())?;
    let first = fs::read(history.path())?;
    history.save(&store, &records())?;
    let second = fs::read(history.path())?;

    assert_ne!(first[..IV_LEN], second[..IV_LEN]);
    assert_ne!(first[IV_LEN..IV_LEN + 16], second[IV_LEN..IV_LEN + 16]);
    assert_eq!(history.load(&store)?, records());
    Ok(())
}

#[test]
fn truncated_file_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    let store = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));
    history.save(&store, &records())?;

    fs::write(history.path(), [0u8; 4])?;

    assert!(history.load(&store).is_err());
    Ok(())
}

#[test]
fn set_aside_keeps_unreadable_file_recoverable() -> Result<()> {
    let dir = tempdir()?;
    let original = MemoryStore::new();
    let history = HistoryStore::new(&dir.path().join("history.bin"));
    history.save(&original, &records())?;

    let fresh = MemoryStore::new();
    assert!(history.load(&fresh).is_err());
    let moved = history.set_aside()?.expect("file existed");
    history.save(&fresh, &[])?;

    assert!(moved.exists());
    assert_ne!(moved, history.path());
    assert_eq!(HistoryStore::new(&moved).load(&original)?, records());
    Ok(())
}

#[test]
fn set_aside_without_file_is_none() -> Result<()> {
    let dir = tempdir()?;
    let history = HistoryStore::new(&dir.path().join("history.bin"));

    assert_eq!(history.set_aside()?, None);
    Ok(())
}
