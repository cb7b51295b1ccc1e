//! Client protocol tests over an in-process loopback transport wired to a
//! real custody service.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sanctum_client::{Client, ClientError, RetryPolicy, Transport, TransportError};
use sanctum_custody::{CredentialAuthority, Custody, CustodyError};
use sanctum_kernel::protocol::{Envelope, SessionGrant};
use sanctum_store::{RecordStore, SessionStore};
use sanctum_vault::Vault;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn rejected(err: CustodyError) -> TransportError {
    TransportError::Rejected { code: err.code().to_owned(), message: err.to_string() }
}

/// Direct wiring to a custody service: what the HTTP layer does, minus
/// the HTTP.
#[derive(Clone)]
struct Loopback {
    custody: Custody,
    credentials: CredentialAuthority,
}

impl Loopback {
    fn new() -> Self {
        let sessions = SessionStore::new(Duration::from_secs(3600), 1000);
        let records = RecordStore::new(Duration::from_secs(900), 1000);
        let vault = Vault::generate().unwrap();
        let credentials =
            CredentialAuthority::init("sanctum-test", Duration::from_secs(3600)).unwrap();
        Self { custody: Custody::new(sessions, records, vault), credentials }
    }
}

#[async_trait]
impl Transport for Loopback {
    async fn establish(&self) -> Result<SessionGrant, TransportError> {
        let session = self.custody.establish_session().map_err(rejected)?;
        let credential = self.credentials.issue(&session.identity).map_err(rejected)?;
        Ok(SessionGrant {
            shared_secret: session.secret.to_hex(),
            identity: session.identity,
            credential,
        })
    }

    async fn save(&self, credential: &str, envelope: Envelope) -> Result<(), TransportError> {
        let identity = self.credentials.verify(credential).map_err(rejected)?;
        self.custody.save(&identity, &envelope).map_err(rejected)
    }

    async fn retrieve(&self, credential: &str) -> Result<Envelope, TransportError> {
        let identity = self.credentials.verify(credential).map_err(rejected)?;
        self.custody.retrieve(&identity).map_err(rejected)
    }

    async fn clear(&self, credential: &str) -> Result<(), TransportError> {
        let identity = self.credentials.verify(credential).map_err(rejected)?;
        self.custody.clear_session(&identity).map_err(rejected)
    }
}

/// Fails the first `failures` establish calls, then delegates.
struct Flaky {
    inner: Loopback,
    failures: AtomicU32,
    attempts: Arc<AtomicU32>,
}

#[async_trait]
impl Transport for Flaky {
    async fn establish(&self) -> Result<SessionGrant, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Connectivity {
                message: "synthetic outage".into(),
                context: None,
            });
        }
        self.inner.establish().await
    }

    async fn save(&self, credential: &str, envelope: Envelope) -> Result<(), TransportError> {
        self.inner.save(credential, envelope).await
    }

    async fn retrieve(&self, credential: &str) -> Result<Envelope, TransportError> {
        self.inner.retrieve(credential).await
    }

    async fn clear(&self, credential: &str) -> Result<(), TransportError> {
        self.inner.clear(credential).await
    }
}

/// Flips one ciphertext byte in every retrieved envelope.
struct WireTamperer {
    inner: Loopback,
}

#[async_trait]
impl Transport for WireTamperer {
    async fn establish(&self) -> Result<SessionGrant, TransportError> {
        self.inner.establish().await
    }

    async fn save(&self, credential: &str, envelope: Envelope) -> Result<(), TransportError> {
        self.inner.save(credential, envelope).await
    }

    async fn retrieve(&self, credential: &str) -> Result<Envelope, TransportError> {
        let mut envelope = self.inner.retrieve(credential).await?;
        let mut raw = BASE64.decode(&envelope.ciphertext).unwrap();
        raw[0] ^= 0x01;
        envelope.ciphertext = BASE64.encode(&raw);
        Ok(envelope)
    }

    async fn clear(&self, credential: &str) -> Result<(), TransportError> {
        self.inner.clear(credential).await
    }
}

async fn wait_until_bound(client: &Client) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while !client.is_bound().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client should have bound a session");
}

#[tokio::test]
async fn test_save_then_retrieve_roundtrip() {
    let client = Client::new(Loopback::new());
    client.establish_session().await.unwrap();

    client.save("hello").await.unwrap();
    assert_eq!(client.retrieve().await.unwrap(), "hello");
}

#[tokio::test]
async fn test_save_while_unbound_is_not_ready_and_self_heals() {
    let client = Client::new(Loopback::new());

    let result = client.save("hello").await;
    assert!(matches!(result, Err(ClientError::SessionNotReady { .. })));

    // The failed call kicked off background establishment.
    wait_until_bound(&client).await;
    client.save("hello").await.unwrap();
    assert_eq!(client.retrieve().await.unwrap(), "hello");
}

#[tokio::test(start_paused = true)]
async fn test_establishment_retries_until_the_outage_clears() {
    let attempts = Arc::new(AtomicU32::new(0));
    let transport = Flaky {
        inner: Loopback::new(),
        failures: AtomicU32::new(2),
        attempts: Arc::clone(&attempts),
    };

    let policy = RetryPolicy { attempts: 3, base_delay: Duration::from_millis(100) };
    let client = Client::with_retry(transport, policy);
    client.establish_session().await.unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(client.is_bound().await);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_connectivity() {
    let attempts = Arc::new(AtomicU32::new(0));
    let transport = Flaky {
        inner: Loopback::new(),
        failures: AtomicU32::new(u32::MAX),
        attempts: Arc::clone(&attempts),
    };

    let client = Client::new(transport);
    let result = client.establish_session().await;

    assert!(matches!(result, Err(ClientError::Connectivity { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(!client.is_bound().await);
}

#[tokio::test]
async fn test_tampered_response_is_rejected_without_state_change() {
    let client = Client::new(WireTamperer { inner: Loopback::new() });
    client.establish_session().await.unwrap();
    client.save("hello").await.unwrap();

    let identity_before = client.identity().await;
    let result = client.retrieve().await;

    assert!(matches!(result, Err(ClientError::IntegrityCompromisedInTransit { .. })));
    // No decryption happened and no client state moved: still bound, same
    // session, and a save against the honest server still works.
    assert!(client.is_bound().await);
    assert_eq!(client.identity().await, identity_before);
    client.save("hello").await.unwrap();
}

#[tokio::test]
async fn test_clear_session_rebinds_with_a_fresh_identity() {
    let client = Client::new(Loopback::new());
    client.establish_session().await.unwrap();
    let first = client.identity().await.unwrap();

    client.clear_session().await;
    wait_until_bound(&client).await;

    let second = client.identity().await.unwrap();
    assert_ne!(first, second, "clearing must regenerate the identity");
}

#[tokio::test]
async fn test_server_side_session_loss_degrades_to_not_ready() {
    let loopback = Loopback::new();
    let client = Client::new(loopback.clone());
    client.establish_session().await.unwrap();
    client.save("hello").await.unwrap();

    // The server loses the session behind the client's back.
    let identity = client.identity().await.unwrap();
    loopback.custody.clear_session(&identity).unwrap();

    let result = client.retrieve().await;
    assert!(matches!(result, Err(ClientError::SessionNotReady { .. })));

    // Transparent degradation: a fresh session binds in the background.
    wait_until_bound(&client).await;
    assert_ne!(client.identity().await.unwrap(), identity);
}

#[tokio::test]
async fn test_retrieve_before_any_save_reports_data_missing() {
    let client = Client::new(Loopback::new());
    client.establish_session().await.unwrap();

    let result = client.retrieve().await;
    match result {
        Err(ClientError::Rejected { code, .. }) => assert_eq!(code, "data_missing"),
        other => panic!("expected data_missing rejection, got {other:?}"),
    }
}
