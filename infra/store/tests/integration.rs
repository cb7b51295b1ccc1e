use sanctum_store::{RecordStore, SessionStore};
use sanctum_vault::Vault;
use std::time::Duration;

fn record_store() -> (RecordStore, Vault) {
    (RecordStore::new(Duration::from_secs(60), 100), Vault::generate().unwrap())
}

#[test]
fn test_save_then_read_returns_the_pair() {
    let (records, vault) = record_store();
    let tag = vault.at_rest_tag(b"ciphertext");

    records.save("id-1", "hello", tag).unwrap();

    let primary = records.read_primary("id-1").unwrap().expect("primary must exist");
    assert_eq!(primary.payload, "hello");
    assert_eq!(primary.tag, tag);
    assert_eq!(records.read_backup("id-1").unwrap().as_deref(), Some("hello"));
}

#[test]
fn test_save_replaces_both_halves_together() {
    let (records, vault) = record_store();

    records.save("id-1", "first", vault.at_rest_tag(b"a")).unwrap();
    records.save("id-1", "second", vault.at_rest_tag(b"b")).unwrap();

    let primary = records.read_primary("id-1").unwrap().unwrap();
    let backup = records.read_backup("id-1").unwrap().unwrap();
    assert_eq!(primary.payload, "second");
    assert_eq!(backup, "second");
}

#[test]
fn test_promote_backup_rewrites_from_backup() {
    let (records, vault) = record_store();
    let stale_tag = vault.at_rest_tag(b"stale");
    let fresh_tag = vault.at_rest_tag(b"fresh");

    // A primary whose tag no longer matches, with the backup still good:
    // the wrong-tag save plus a backup restore reproduces external
    // tampering through public operations alone.
    records.save("id-1", "garbled", stale_tag).unwrap();
    records.restore_backup("id-1", "hello").unwrap();

    let promoted = records.promote_backup("id-1", fresh_tag).unwrap();
    assert_eq!(promoted.as_deref(), Some("hello"));

    let primary = records.read_primary("id-1").unwrap().unwrap();
    assert_eq!(primary.payload, "hello");
    assert_eq!(primary.tag, fresh_tag);
}

#[test]
fn test_promote_backup_is_idempotent() {
    let (records, vault) = record_store();
    let fresh_tag = vault.at_rest_tag(b"fresh");

    records.save("id-1", "hello", vault.at_rest_tag(b"old")).unwrap();

    let first = records.promote_backup("id-1", fresh_tag).unwrap();
    let second = records.promote_backup("id-1", fresh_tag).unwrap();
    assert_eq!(first, second);

    let primary = records.read_primary("id-1").unwrap().unwrap();
    assert_eq!(primary.payload, "hello");
    assert_eq!(primary.tag, fresh_tag);
    assert_eq!(records.read_backup("id-1").unwrap().as_deref(), Some("hello"));
}

#[test]
fn test_promote_without_backup_reports_missing() {
    let (records, vault) = record_store();
    let promoted = records.promote_backup("nothing-here", vault.at_rest_tag(b"x")).unwrap();
    assert!(promoted.is_none());
}

#[test]
fn test_restore_backup_leaves_primary_untouched() {
    let (records, vault) = record_store();
    let tag = vault.at_rest_tag(b"ciphertext");

    records.save("id-1", "hello", tag).unwrap();
    records.restore_backup("id-1", "recovered").unwrap();

    let primary = records.read_primary("id-1").unwrap().unwrap();
    assert_eq!(primary.payload, "hello");
    assert_eq!(records.read_backup("id-1").unwrap().as_deref(), Some("recovered"));
}

#[test]
fn test_restore_backup_can_seed_an_empty_slot() {
    let (records, _vault) = record_store();

    records.restore_backup("id-1", "seeded").unwrap();

    assert!(records.read_primary("id-1").unwrap().is_none());
    assert_eq!(records.read_backup("id-1").unwrap().as_deref(), Some("seeded"));
}

#[test]
fn test_records_expire_after_ttl() {
    let records = RecordStore::new(Duration::from_millis(200), 100);
    let vault = Vault::generate().unwrap();

    records.save("id-1", "hello", vault.at_rest_tag(b"ct")).unwrap();
    assert!(records.read_primary("id-1").unwrap().is_some());

    std::thread::sleep(Duration::from_millis(500));
    assert!(records.read_primary("id-1").unwrap().is_none());
    assert!(records.read_backup("id-1").unwrap().is_none());
}

#[test]
fn test_session_reads_slide_the_expiry_window() {
    let sessions = SessionStore::new(Duration::from_millis(500), 100);
    let session = sessions.establish().unwrap();

    // Keep reading inside the window; the session must outlive several
    // full TTL spans because each read restarts the clock.
    for _ in 0..4 {
        std::thread::sleep(Duration::from_millis(250));
        assert!(
            sessions.lookup(&session.identity).unwrap().is_some(),
            "a read within the TTL window must keep the session alive"
        );
    }

    std::thread::sleep(Duration::from_millis(1200));
    assert!(
        sessions.lookup(&session.identity).unwrap().is_none(),
        "an untouched session must expire"
    );
}
