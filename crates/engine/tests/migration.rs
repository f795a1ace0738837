use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cachemig_core::{Entry, Error, Key, KeyPage, MigrateConfig, ScanCursor, SqliteStore, Store};
use cachemig_engine::{
    EntryField, FaultStage, MigrationObserver, Migrator, RunError, RunOptions, Stage, Verifier, migrate_and_verify,
    run_cycle, run_verify_only,
};
use chrono::{TimeZone, Utc};

/// Wraps a store and injects faults or vanishing keys.
///
/// Calls are counted from 1 across the store's lifetime, so a get fault can be
/// aimed at either pass.
struct FaultyStore {
    inner: SqliteStore,
    fail_set_at: Option<usize>,
    fail_get_at: Option<usize>,
    vanish: Option<Key>,
    sets: AtomicUsize,
    gets: AtomicUsize,
}

impl FaultyStore {
    fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            fail_set_at: None,
            fail_get_at: None,
            vanish: None,
            sets: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    fn failing_set(mut self, nth: usize) -> Self {
        self.fail_set_at = Some(nth);
        self
    }

    fn failing_get(mut self, nth: usize) -> Self {
        self.fail_get_at = Some(nth);
        self
    }

    fn vanishing(mut self, key: &str) -> Self {
        self.vanish = Some(Key::from(key));
        self
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn scan_keys(&self, after: Option<ScanCursor>, limit: usize) -> Result<KeyPage, Error> {
        self.inner.scan_keys(after, limit).await
    }

    async fn get(&self, key: &Key) -> Result<Option<Entry>, Error> {
        let nth = self.gets.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_get_at == Some(nth) {
            return Err(Error::Io(std::io::Error::other("injected read fault")));
        }
        if self.vanish.as_ref() == Some(key) {
            return Ok(None);
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &Key, entry: &Entry) -> Result<(), Error> {
        let nth = self.sets.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_set_at == Some(nth) {
            return Err(Error::Io(std::io::Error::other("injected write fault")));
        }
        self.inner.set(key, entry).await
    }

    async fn count(&self) -> Result<u64, Error> {
        self.inner.count().await
    }

    async fn close(&self) -> Result<(), Error> {
        self.inner.close().await
    }
}

#[derive(Default)]
struct RecordingObserver {
    started: Mutex<Vec<Stage>>,
    vanished: Mutex<Vec<Key>>,
    migrated: AtomicUsize,
}

impl MigrationObserver for RecordingObserver {
    fn stage_started(&self, stage: Stage) {
        self.started.lock().unwrap().push(stage);
    }

    fn key_vanished(&self, key: &Key) {
        self.vanished.lock().unwrap().push(key.clone());
    }

    fn key_migrated(&self, _key: &Key, _entry: &Entry) {
        self.migrated.fetch_add(1, Ordering::SeqCst);
    }
}

fn key(i: usize) -> Key {
    Key::from(format!("k{i:02}"))
}

/// Entries with every combination of present/absent expiration and tag.
fn entry(i: usize) -> Entry {
    let mut entry = Entry::new(format!("value-{i}").into_bytes());
    if i % 2 == 0 {
        entry = entry.expiring_at(Utc.timestamp_opt(1_900_000_000 + i as i64, 123_456_000).unwrap());
    }
    if i % 3 == 0 {
        entry = entry.tagged(format!("tag-{}", i % 4));
    }
    entry
}

async fn populated(n: usize) -> SqliteStore {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for i in 0..n {
        store.set(&key(i), &entry(i)).await.unwrap();
    }
    store
}

async fn populated_dir(dir: &std::path::Path, n: usize) {
    let store = SqliteStore::create_fresh(dir, "cache.db").await.unwrap();
    for i in 0..n {
        store.set(&key(i), &entry(i)).await.unwrap();
    }
    store.close().await.unwrap();
}

fn options(page_size: usize) -> RunOptions {
    RunOptions { page_size, check_key_count: true }
}

#[tokio::test]
async fn completeness_and_field_fidelity() {
    let source = populated(25).await;
    let destination = SqliteStore::open_in_memory().await.unwrap();
    let observer = RecordingObserver::default();

    let report = migrate_and_verify(&source, &destination, options(4), &observer).await;

    assert!(report.summary.is_success(), "{}", report.summary);
    let migration = report.migration.unwrap();
    assert_eq!(migration.keys_seen, 25);
    assert_eq!(migration.migrated, 25);
    assert_eq!(migration.failed, 0);
    assert_eq!(report.verification.unwrap().verified, 25);
    assert_eq!(observer.migrated.load(Ordering::SeqCst), 25);

    assert_eq!(destination.count().await.unwrap(), 25);
    for i in 0..25 {
        let copied = destination.get(&key(i)).await.unwrap().unwrap();
        assert_eq!(copied, source.get(&key(i)).await.unwrap().unwrap());
        assert_eq!(copied, entry(i));
    }
}

#[tokio::test]
async fn source_is_left_untouched() {
    let source = populated(6).await;
    let destination = SqliteStore::open_in_memory().await.unwrap();

    migrate_and_verify(&source, &destination, options(2), &RecordingObserver::default()).await;

    assert_eq!(source.count().await.unwrap(), 6);
    for i in 0..6 {
        assert_eq!(source.get(&key(i)).await.unwrap().unwrap(), entry(i));
    }
}

#[tokio::test]
async fn fail_fast_on_third_write() {
    let source = populated(10).await;
    let destination = FaultyStore::new(SqliteStore::open_in_memory().await.unwrap()).failing_set(3);
    let observer = RecordingObserver::default();

    let report = migrate_and_verify(&source, &destination, options(4), &observer).await;

    let migration = report.migration.as_ref().unwrap();
    assert!(migration.failed >= 1);
    assert_eq!(migration.migrated, 2);
    assert_eq!(migration.keys_seen, 3);
    let fault = migration.first_error.as_ref().unwrap();
    assert_eq!(fault.stage, FaultStage::DestinationWrite);
    assert_eq!(fault.key, Some(key(2)));

    assert!(report.verification.is_none());
    assert_eq!(*observer.started.lock().unwrap(), vec![Stage::Migrate]);
    assert!(!report.summary.is_success());
    assert!(matches!(report.outcome(), Err(RunError::DestinationWriteFault { .. })));
    assert_eq!(destination.count().await.unwrap(), 2);
}

#[tokio::test]
async fn source_read_fault_aborts_migration() {
    let source = FaultyStore::new(populated(5).await).failing_get(3);
    let destination = SqliteStore::open_in_memory().await.unwrap();
    let observer = RecordingObserver::default();

    let report = migrate_and_verify(&source, &destination, options(2), &observer).await;

    let migration = report.migration.as_ref().unwrap();
    assert_eq!(migration.keys_seen, 3);
    assert_eq!(migration.migrated, 2);
    assert_eq!(migration.failed, 1);
    let fault = migration.first_error.as_ref().unwrap();
    assert_eq!(fault.stage, FaultStage::SourceRead);
    assert_eq!(fault.key, Some(key(2)));
    assert!(fault.message.contains("injected read fault"));

    assert!(report.verification.is_none());
    assert_eq!(*observer.started.lock().unwrap(), vec![Stage::Migrate]);
    match report.outcome() {
        Err(RunError::SourceReadFault { key, .. }) => assert_eq!(key, "k02"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(destination.count().await.unwrap(), 2);
}

#[tokio::test]
async fn destination_read_fault_during_verification() {
    let source = populated(5).await;
    let destination = FaultyStore::new(SqliteStore::open_in_memory().await.unwrap()).failing_get(2);
    let observer = RecordingObserver::default();

    let report = migrate_and_verify(&source, &destination, options(2), &observer).await;

    assert!(report.migration.as_ref().unwrap().is_clean());
    let verification = report.verification.as_ref().unwrap();
    assert_eq!(verification.verified, 1);
    assert!(verification.mismatch.is_none());
    let fault = verification.fault.as_ref().unwrap();
    assert_eq!(fault.stage, FaultStage::DestinationRead);
    assert_eq!(fault.key, Some(key(1)));

    assert!(!report.summary.is_success());
    match report.outcome() {
        Err(RunError::DestinationReadFault { key, .. }) => assert_eq!(key, "k01"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn source_read_fault_during_verification() {
    // Migration reads each of the five keys once; the sixth get is the
    // verification pass's first.
    let source = FaultyStore::new(populated(5).await).failing_get(6);
    let destination = SqliteStore::open_in_memory().await.unwrap();
    let observer = RecordingObserver::default();

    let report = migrate_and_verify(&source, &destination, options(2), &observer).await;

    assert!(report.migration.as_ref().unwrap().is_clean());
    assert_eq!(*observer.started.lock().unwrap(), vec![Stage::Migrate, Stage::Verify]);
    let verification = report.verification.as_ref().unwrap();
    assert_eq!(verification.verified, 0);
    let fault = verification.fault.as_ref().unwrap();
    assert_eq!(fault.stage, FaultStage::SourceRead);
    assert_eq!(fault.key, Some(key(0)));

    match report.outcome() {
        Err(RunError::SourceReadFault { key, .. }) => assert_eq!(key, "k00"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn corrupted_value_is_detected() {
    let source = populated(10).await;
    let destination = SqliteStore::open_in_memory().await.unwrap();
    let observer = RecordingObserver::default();

    let migration = Migrator::new(&observer, 3).migrate(&source, &destination).await;
    assert!(migration.is_clean());

    let mut corrupted = destination.get(&key(9)).await.unwrap().unwrap();
    corrupted.value[0] ^= 0x01;
    destination.set(&key(9), &corrupted).await.unwrap();

    let verification = Verifier::new(&observer, 3).verify(&source, &destination).await;

    assert_eq!(verification.verified, 9);
    let mismatch = verification.mismatch.as_ref().unwrap();
    assert_eq!(mismatch.key, key(9));
    assert_eq!(mismatch.field, EntryField::Value);
    assert!(verification.fault.is_none());
}

#[tokio::test]
async fn changed_expiration_and_tag_are_detected() {
    let source = populated(4).await;
    let destination = SqliteStore::open_in_memory().await.unwrap();
    let observer = RecordingObserver::default();
    Migrator::new(&observer, 8).migrate(&source, &destination).await;

    let mut altered = entry(0);
    altered.expire_at = None;
    destination.set(&key(0), &altered).await.unwrap();
    let verification = Verifier::new(&observer, 8).verify(&source, &destination).await;
    assert_eq!(verification.mismatch.unwrap().field, EntryField::Expiration);

    destination.set(&key(0), &entry(0).tagged("retagged")).await.unwrap();
    let verification = Verifier::new(&observer, 8).verify(&source, &destination).await;
    assert_eq!(verification.mismatch.unwrap().field, EntryField::Tag);
}

#[tokio::test]
async fn missing_destination_key_is_detected() {
    let source = populated(5).await;
    let destination = SqliteStore::open_in_memory().await.unwrap();
    let observer = RecordingObserver::default();
    Migrator::new(&observer, 8).migrate(&source, &destination).await;

    assert!(destination.remove(&key(3)).await.unwrap());
    let verification = Verifier::new(&observer, 8).verify(&source, &destination).await;

    let mismatch = verification.mismatch.as_ref().unwrap();
    assert_eq!(mismatch.key, key(3));
    assert_eq!(mismatch.field, EntryField::Presence);
    assert_eq!(verification.verified, 3);
}

#[tokio::test]
async fn destination_only_key_caught_by_count_check() {
    let source = populated(3).await;
    let destination = SqliteStore::open_in_memory().await.unwrap();
    let observer = RecordingObserver::default();
    Migrator::new(&observer, 8).migrate(&source, &destination).await;
    destination.set(&Key::from("stray"), &Entry::new(b"x".to_vec())).await.unwrap();

    let unchecked = Verifier::new(&observer, 8).verify(&source, &destination).await;
    assert!(unchecked.is_clean());
    assert!(unchecked.key_counts.is_none());

    let checked = Verifier::new(&observer, 8)
        .with_key_count_check(true)
        .verify(&source, &destination)
        .await;
    assert!(!checked.is_clean());
    let counts = checked.key_counts.unwrap();
    assert_eq!((counts.source, counts.destination), (3, 4));
}

#[tokio::test]
async fn vanished_key_is_not_a_failure() {
    let source = FaultyStore::new(populated(5).await).vanishing("k02");
    let destination = SqliteStore::open_in_memory().await.unwrap();
    let observer = RecordingObserver::default();

    let migration = Migrator::new(&observer, 2).migrate(&source, &destination).await;

    assert!(migration.is_clean());
    assert_eq!(migration.keys_seen, 5);
    assert_eq!(migration.migrated, 4);
    assert_eq!(migration.vanished, 1);
    assert_eq!(*observer.vanished.lock().unwrap(), vec![key(2)]);
    assert!(destination.get(&key(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn empty_store() {
    let source = SqliteStore::open_in_memory().await.unwrap();
    let destination = SqliteStore::open_in_memory().await.unwrap();

    let report = migrate_and_verify(&source, &destination, options(16), &RecordingObserver::default()).await;

    let migration = report.migration.unwrap();
    assert_eq!((migration.keys_seen, migration.migrated, migration.failed), (0, 0, 0));
    assert_eq!(report.verification.unwrap().verified, 0);
    assert!(report.summary.is_success());
}

#[tokio::test]
async fn rerun_against_fresh_destinations_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let source_dir = dir.path().join("old-cache");
    populated_dir(&source_dir, 12).await;
    let config = MigrateConfig { page_size: 5, ..Default::default() };
    let observer = RecordingObserver::default();

    let first = run_cycle(&source_dir, &dir.path().join("new-a"), &config, &observer).await.unwrap();
    let second = run_cycle(&source_dir, &dir.path().join("new-b"), &config, &observer).await.unwrap();

    assert!(first.summary.is_success());
    assert_eq!(first.migration, second.migration);
    assert_eq!(first.verification, second.verification);
    assert_eq!(first.summary.verified, Some(12));
}

#[tokio::test]
async fn run_cycle_closes_stores_and_persists_destination() {
    let dir = tempfile::tempdir().unwrap();
    let source_dir = dir.path().join("old-cache");
    let destination_dir = dir.path().join("new-cache");
    populated_dir(&source_dir, 4).await;
    let config = MigrateConfig::default();

    let report = run_cycle(&source_dir, &destination_dir, &config, &RecordingObserver::default()).await.unwrap();
    assert!(report.outcome().is_ok());

    let reopened = SqliteStore::open_existing(&destination_dir, "cache.db").await.unwrap();
    assert_eq!(reopened.count().await.unwrap(), 4);
    assert_eq!(reopened.get(&key(0)).await.unwrap().unwrap(), entry(0));
    reopened.close().await.unwrap();

    let verify = run_verify_only(&source_dir, &destination_dir, &config, &RecordingObserver::default()).await.unwrap();
    assert!(verify.migration.is_none());
    assert_eq!(verify.summary.verified, Some(4));
    assert!(verify.summary.is_success());
}

#[tokio::test]
async fn run_cycle_rejects_populated_destination() {
    let dir = tempfile::tempdir().unwrap();
    let source_dir = dir.path().join("old-cache");
    let destination_dir = dir.path().join("new-cache");
    populated_dir(&source_dir, 2).await;
    populated_dir(&destination_dir, 1).await;

    let result = run_cycle(&source_dir, &destination_dir, &MigrateConfig::default(), &RecordingObserver::default()).await;

    assert!(matches!(result, Err(RunError::OpenDestination(Error::DestinationNotEmpty { count: 1, .. }))));
}
