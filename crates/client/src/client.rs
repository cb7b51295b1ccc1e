use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sanctum_kernel::protocol::Envelope;
use sanctum_vault::{AuthTag, SharedSecret, Transit, cipher, transit_tag, verify_transit};
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backoff::RetryPolicy;
use crate::error::ClientError;
use crate::transport::{Transport, TransportError};

/// Server error codes that mean the session is gone and the right move
/// is to re-establish, not to surface a hard failure.
const REBIND_CODES: &[&str] = &["session_expired", "credential_invalid", "transit_tag_mismatch"];

enum SessionState {
    Unbound,
    Bound(BoundSession),
}

struct BoundSession {
    identity: String,
    secret: SharedSecret,
    credential: String,
    /// Ciphertext of the last successful save, kept to detect a caller
    /// replacing the slot content under the same identity+secret pair
    /// (an IV-reuse hazard this design accepts but never hides).
    last_saved: Option<Vec<u8>>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    state: tokio::sync::Mutex<SessionState>,
    establishing: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        // Tear down any in-flight background establishment with the client.
        if let Ok(mut guard) = self.establishing.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// The client half of the protected-data protocol.
///
/// A client is a state machine: `Unbound → Bound → Unbound`. Operations
/// that find the session missing return
/// [`ClientError::SessionNotReady`] and trigger re-establishment as a
/// background task — bounded exponential backoff, cancellable on drop,
/// never blocking the caller.
///
/// Cheaply clonable; clones share the session. Operations on one logical
/// session are serialized internally; callers should still not overlap
/// `save`/`retrieve` with an in-flight `clear_session`, per the
/// single-writer contract.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("retry", &self.inner.retry).finish()
    }
}

impl Client {
    /// Creates an unbound client over a transport with the default retry
    /// policy. Must be called within a tokio runtime.
    #[must_use]
    pub fn new(transport: impl Transport) -> Self {
        Self::with_retry(transport, RetryPolicy::default())
    }

    /// Creates an unbound client with an explicit retry policy.
    #[must_use]
    pub fn with_retry(transport: impl Transport, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport: Arc::new(transport),
                retry,
                state: tokio::sync::Mutex::new(SessionState::Unbound),
                establishing: Mutex::new(None),
            }),
        }
    }

    /// Establishes a session now, retrying per the policy, and waits for
    /// the outcome.
    ///
    /// # Errors
    /// Returns [`ClientError::Connectivity`] once the attempts are
    /// exhausted, or [`ClientError::MalformedResponse`] if the grant is
    /// undecodable.
    pub async fn establish_session(&self) -> Result<(), ClientError> {
        establish_with_backoff(&Arc::downgrade(&self.inner)).await
    }

    /// Encrypts, tags, and sends a payload into the session slot.
    ///
    /// While `Unbound`, the call fails with
    /// [`ClientError::SessionNotReady`] and establishment proceeds in the
    /// background; retry once it completes. A server-reported session or
    /// integrity rejection unbinds and re-establishes the same way.
    ///
    /// # Errors
    /// See [`ClientError`]; `SessionNotReady` is the only recoverable
    /// kind expected in normal operation.
    pub async fn save(&self, plaintext: &str) -> Result<(), ClientError> {
        let mut state = self.inner.state.lock().await;
        let SessionState::Bound(bound) = &mut *state else {
            drop(state);
            self.trigger_establish();
            return Err(not_ready("no bound session; establishment started"));
        };

        let key = cipher::derive_key(&bound.secret);
        let iv = cipher::derive_iv(&bound.identity)?;
        let ciphertext = cipher::encrypt(plaintext.as_bytes(), &key, &iv);

        if let Some(previous) = &bound.last_saved {
            if *previous != ciphertext {
                warn!(
                    identity = %bound.identity,
                    "Replacing slot content within one session reuses the deterministic IV; \
                     clear the session first when storing unrelated payloads"
                );
            }
        }

        let tag = transit_tag(&ciphertext, &bound.secret);
        let envelope = Envelope { ciphertext: BASE64.encode(&ciphertext), tag: tag.to_hex() };

        match self.inner.transport.save(&bound.credential, envelope).await {
            Ok(()) => {
                bound.last_saved = Some(ciphertext);
                debug!(identity = %bound.identity, "Payload saved");
                Ok(())
            },
            Err(TransportError::Rejected { code, .. }) if REBIND_CODES.contains(&code.as_str()) => {
                *state = SessionState::Unbound;
                drop(state);
                self.trigger_establish();
                Err(not_ready("server dropped the session; re-establishment started"))
            },
            Err(other) => Err(other.into()),
        }
    }

    /// Fetches the stored payload, verifying the response tag before any
    /// decryption.
    ///
    /// A tag mismatch fails with
    /// [`ClientError::IntegrityCompromisedInTransit`] and leaves every
    /// piece of client state untouched — the session stays bound and a
    /// retry may well succeed against an untampered response.
    ///
    /// # Errors
    /// See [`ClientError`].
    pub async fn retrieve(&self) -> Result<String, ClientError> {
        let mut state = self.inner.state.lock().await;
        let SessionState::Bound(bound) = &mut *state else {
            drop(state);
            self.trigger_establish();
            return Err(not_ready("no bound session; establishment started"));
        };

        let envelope = match self.inner.transport.retrieve(&bound.credential).await {
            Ok(envelope) => envelope,
            Err(TransportError::Rejected { code, .. }) if REBIND_CODES.contains(&code.as_str()) => {
                *state = SessionState::Unbound;
                drop(state);
                self.trigger_establish();
                return Err(not_ready("server dropped the session; re-establishment started"));
            },
            Err(other) => return Err(other.into()),
        };

        let ciphertext = BASE64.decode(&envelope.ciphertext).map_err(|_| {
            ClientError::MalformedResponse {
                message: "response ciphertext is not valid base64".into(),
                context: None,
            }
        })?;
        let tag = AuthTag::<Transit>::from_hex(&envelope.tag)?;

        // Verify before decrypt; a wrong tag means the ciphertext cannot
        // be trusted at all.
        verify_transit(&ciphertext, &bound.secret, &tag)?;

        let key = cipher::derive_key(&bound.secret);
        let iv = cipher::derive_iv(&bound.identity)?;
        let plaintext = cipher::decrypt(&ciphertext, &key, &iv)?;

        String::from_utf8(plaintext).map_err(|_| ClientError::MalformedResponse {
            message: "decrypted payload is not valid UTF-8".into(),
            context: None,
        })
    }

    /// Discards the local session, best-effort invalidates it server-side,
    /// and immediately starts establishing a fresh one in the background
    /// so the client is ready for the next operation.
    pub async fn clear_session(&self) {
        let mut state = self.inner.state.lock().await;
        if let SessionState::Bound(bound) = &*state {
            if let Err(err) = self.inner.transport.clear(&bound.credential).await {
                debug!(error = %err, "Server-side session clear failed; expiring naturally");
            }
            info!(identity = %bound.identity, "Session cleared");
        }
        *state = SessionState::Unbound;
        drop(state);
        self.trigger_establish();
    }

    /// Whether a session is currently bound.
    pub async fn is_bound(&self) -> bool {
        matches!(&*self.inner.state.lock().await, SessionState::Bound(_))
    }

    /// The bound identity, if any. Useful for diagnostics and tests.
    pub async fn identity(&self) -> Option<String> {
        match &*self.inner.state.lock().await {
            SessionState::Bound(bound) => Some(bound.identity.clone()),
            SessionState::Unbound => None,
        }
    }

    /// Starts one background establishment task, unless one is already
    /// running.
    fn trigger_establish(&self) {
        let mut guard = match self.inner.establishing.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }

        // The task only holds a weak handle: once every client clone is
        // gone it stops at the next attempt instead of keeping the
        // client alive.
        let weak = Arc::downgrade(&self.inner);
        *guard = Some(tokio::spawn(async move {
            if let Err(err) = establish_with_backoff(&weak).await {
                warn!(error = %err, "Background session establishment failed");
            }
        }));
    }
}

async fn establish_with_backoff(weak: &Weak<ClientInner>) -> Result<(), ClientError> {
    let retry = match weak.upgrade() {
        Some(inner) => inner.retry,
        None => return Err(torn_down()),
    };
    let mut delays = retry.delays();

    for attempt in 1..=retry.attempts {
        let Some(inner) = weak.upgrade() else {
            return Err(torn_down());
        };

        match inner.transport.establish().await {
            Ok(grant) => {
                let secret = SharedSecret::from_hex(&grant.shared_secret).map_err(|_| {
                    ClientError::MalformedResponse {
                        message: "session grant carries an undecodable secret".into(),
                        context: None,
                    }
                })?;

                info!(identity = %grant.identity, "Session established");
                let mut state = inner.state.lock().await;
                *state = SessionState::Bound(BoundSession {
                    identity: grant.identity,
                    secret,
                    credential: grant.credential,
                    last_saved: None,
                });
                return Ok(());
            },
            Err(err) => {
                warn!(attempt, error = %err, "Session establishment attempt failed");
                drop(inner);
                if let Some(delay) = delays.next() {
                    tokio::time::sleep(delay).await;
                } else {
                    return Err(ClientError::Connectivity {
                        message: format!("establishment failed after {attempt} attempts: {err}")
                            .into(),
                        context: None,
                    });
                }
            },
        }
    }

    // Only reachable with a zero-attempt policy.
    Err(ClientError::Connectivity {
        message: "retry policy allows no attempts".into(),
        context: None,
    })
}

fn torn_down() -> ClientError {
    ClientError::Connectivity {
        message: "client dropped during establishment".into(),
        context: None,
    }
}

fn not_ready(message: &'static str) -> ClientError {
    ClientError::SessionNotReady { message: message.into(), context: None }
}
