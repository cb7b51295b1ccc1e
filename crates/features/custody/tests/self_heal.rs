use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sanctum_custody::{Custody, CustodyError};
use sanctum_kernel::protocol::Envelope;
use sanctum_store::{RecordStore, SessionStore};
use sanctum_vault::{AuthTag, SharedSecret, Transit, Vault, cipher, transit_tag, verify_transit};
use std::time::Duration;

struct Harness {
    custody: Custody,
    records: RecordStore,
    vault: Vault,
}

fn harness() -> Harness {
    let sessions = SessionStore::new(Duration::from_secs(3600), 1000);
    let records = RecordStore::new(Duration::from_secs(900), 1000);
    let vault = Vault::generate().unwrap();
    let custody = Custody::new(sessions, records.clone(), vault.clone());
    Harness { custody, records, vault }
}

/// What a well-behaved client sends for `payload`.
fn client_envelope(payload: &str, secret: &SharedSecret, identity: &str) -> Envelope {
    let key = cipher::derive_key(secret);
    let iv = cipher::derive_iv(identity).unwrap();
    let ciphertext = cipher::encrypt(payload.as_bytes(), &key, &iv);
    let tag = transit_tag(&ciphertext, secret);
    Envelope { ciphertext: BASE64.encode(&ciphertext), tag: tag.to_hex() }
}

/// What a well-behaved client does with a retrieved envelope.
fn client_open(envelope: &Envelope, secret: &SharedSecret, identity: &str) -> String {
    let ciphertext = BASE64.decode(&envelope.ciphertext).unwrap();
    let tag = AuthTag::<Transit>::from_hex(&envelope.tag).unwrap();
    verify_transit(&ciphertext, secret, &tag).expect("response tag must verify");

    let key = cipher::derive_key(secret);
    let iv = cipher::derive_iv(identity).unwrap();
    String::from_utf8(cipher::decrypt(&ciphertext, &key, &iv).unwrap()).unwrap()
}

#[test]
fn test_save_then_retrieve_roundtrip() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    let envelope = client_envelope("hello", &session.secret, &session.identity);
    h.custody.save(&session.identity, &envelope).unwrap();

    let response = h.custody.retrieve(&session.identity).unwrap();
    assert_eq!(client_open(&response, &session.secret, &session.identity), "hello");

    // The stored at-rest tag matches a fresh recomputation.
    let primary = h.records.read_primary(&session.identity).unwrap().unwrap();
    let (ciphertext, _) = h.vault.reseal(&primary.payload, &session.secret, &session.identity).unwrap();
    h.vault.verify_at_rest(&ciphertext, &primary.tag).unwrap();
}

#[test]
fn test_tampered_primary_heals_from_backup() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    let envelope = client_envelope("hello", &session.secret, &session.identity);
    h.custody.save(&session.identity, &envelope).unwrap();

    // Attacker rewrites the stored payload without updating the tag.
    h.records.corrupt_primary(&session.identity, "EVIL");

    let response = h.custody.retrieve(&session.identity).unwrap();
    assert_eq!(client_open(&response, &session.secret, &session.identity), "hello");

    // The healed primary must now verify on its own.
    let primary = h.records.read_primary(&session.identity).unwrap().unwrap();
    assert_eq!(primary.payload, "hello");
    let (ciphertext, _) = h.vault.reseal(&primary.payload, &session.secret, &session.identity).unwrap();
    h.vault.verify_at_rest(&ciphertext, &primary.tag).unwrap();
}

#[test]
fn test_corrupted_tag_heals_and_stays_healed() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    let envelope = client_envelope("hello", &session.secret, &session.identity);
    h.custody.save(&session.identity, &envelope).unwrap();

    // Force-overwrite the stored tag with one for different bytes while
    // the backup stays intact.
    let bogus = h.vault.at_rest_tag(b"something else entirely");
    h.records.save(&session.identity, "hello", bogus).unwrap();

    // First read heals transparently.
    let first = h.custody.retrieve(&session.identity).unwrap();
    assert_eq!(client_open(&first, &session.secret, &session.identity), "hello");

    // Second read must take the tamper-free path: the primary is already
    // consistent, so its stored state does not change again.
    let before = h.records.read_primary(&session.identity).unwrap().unwrap();
    let second = h.custody.retrieve(&session.identity).unwrap();
    let after = h.records.read_primary(&session.identity).unwrap().unwrap();

    assert_eq!(client_open(&second, &session.secret, &session.identity), "hello");
    assert_eq!(before.payload, after.payload);
    assert_eq!(before.tag, after.tag);
}

#[test]
fn test_tampering_without_backup_is_terminal() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    let envelope = client_envelope("hello", &session.secret, &session.identity);
    h.custody.save(&session.identity, &envelope).unwrap();

    h.records.corrupt_primary(&session.identity, "EVIL");
    h.records.drop_backup(&session.identity);

    let result = h.custody.retrieve(&session.identity);
    assert!(matches!(result, Err(CustodyError::DataTamperedNoBackup { .. })));
}

#[test]
fn test_transit_tamper_on_save_is_rejected_and_stores_nothing() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    let mut envelope = client_envelope("hello", &session.secret, &session.identity);
    let mut raw = BASE64.decode(&envelope.ciphertext).unwrap();
    raw[0] ^= 0x01;
    envelope.ciphertext = BASE64.encode(&raw);

    let result = h.custody.save(&session.identity, &envelope);
    assert!(matches!(result, Err(CustodyError::TransitTagMismatch { .. })));
    assert!(h.records.read_primary(&session.identity).unwrap().is_none());
}

#[test]
fn test_unknown_identity_is_session_expired() {
    let h = harness();
    let envelope_result = h.custody.retrieve("never-established-identity");
    assert!(matches!(envelope_result, Err(CustodyError::SessionExpired { .. })));
}

#[test]
fn test_cleared_session_is_session_expired() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    h.custody.clear_session(&session.identity).unwrap();

    let result = h.custody.retrieve(&session.identity);
    assert!(matches!(result, Err(CustodyError::SessionExpired { .. })));
}

#[test]
fn test_established_session_without_data_is_data_missing() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    let result = h.custody.retrieve(&session.identity);
    assert!(matches!(result, Err(CustodyError::DataMissing { .. })));
}

#[test]
fn test_restore_backup_feeds_the_next_heal() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    let envelope = client_envelope("hello", &session.secret, &session.identity);
    h.custody.save(&session.identity, &envelope).unwrap();

    // Disaster recovery rewrites the backup, then the primary is lost to
    // tampering: the next read must serve the restored payload.
    h.custody.restore_backup(&session.identity, "restored").unwrap();
    h.records.corrupt_primary(&session.identity, "EVIL");

    let response = h.custody.retrieve(&session.identity).unwrap();
    assert_eq!(client_open(&response, &session.secret, &session.identity), "restored");
}

#[test]
fn test_malformed_envelope_is_rejected() {
    let h = harness();
    let session = h.custody.establish_session().unwrap();

    let envelope = Envelope { ciphertext: "not base64!!!".to_owned(), tag: "zz".to_owned() };
    let result = h.custody.save(&session.identity, &envelope);
    assert!(matches!(result, Err(CustodyError::MalformedEnvelope { .. })));
}
