//! Per-connection lifecycle: admit, register, keep alive, unregister.
//!
//! Each accepted connection runs [`handle_session`] in its own task:
//!
//! 1. **Admit**: validate the credential from the upgrade URL. Any
//!    failure closes the transport; the hub never sees the connection.
//! 2. **Register**: hand a [`Session`] to the hub.
//! 3. **Keep alive**: read and discard inbound frames until the client
//!    goes away, a read fails, or the hub evicts the session.
//! 4. **Unregister**: a drop guard queues exactly one unregister on every
//!    exit path, including panics.

use std::sync::Arc;

use boardsync_hub::HubHandle;
use boardsync_protocol::OwnerId;
use boardsync_session::{Authenticator, Session};
use boardsync_transport::{Connection, ConnectionId};
use tokio::sync::watch;

use crate::BoardSyncError;

/// Queues the session's unregister when the lifecycle task ends.
///
/// `Drop` can't be async, so the guard uses the hub's non-blocking
/// [`HubHandle::schedule_unregister`].
struct SessionGuard<C: Connection> {
    owner: OwnerId,
    id: ConnectionId,
    hub: HubHandle<C>,
}

impl<C: Connection> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        self.hub.schedule_unregister(self.owner, self.id);
    }
}

/// Runs one connection from admission to unregister.
///
/// `token` is the credential captured from the upgrade request. Returns an
/// error only for admission failures; a session that was registered always
/// ends with `Ok(())`, whatever ended it.
pub async fn handle_session<C, A>(
    conn: C,
    token: Option<String>,
    auth: &A,
    hub: &HubHandle<C>,
) -> Result<(), BoardSyncError>
where
    C: Connection,
    A: Authenticator,
{
    let id = conn.id();
    tracing::debug!(session = %id, "handling new connection");

    let owner = match auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(owner) => owner,
        Err(e) => {
            tracing::info!(session = %id, error = %e, "connection rejected");
            if let Err(e) = conn.close().await {
                tracing::debug!(session = %id, error = %e, "error closing rejected connection");
            }
            return Err(e.into());
        }
    };

    let conn = Arc::new(conn);
    let session = Arc::new(Session::new(owner, Arc::clone(&conn)));
    let mut evicted = session.evicted();

    if let Err(e) = hub.register(Arc::clone(&session)).await {
        tracing::warn!(session = %id, %owner, error = %e, "registration refused");
        if let Err(e) = session.close().await {
            tracing::debug!(session = %id, error = %e, "error closing refused connection");
        }
        return Err(e.into());
    }

    let _guard = SessionGuard {
        owner,
        id,
        hub: hub.clone(),
    };

    keep_alive(conn.as_ref(), &mut evicted, owner).await;
    Ok(())
}

/// Reads until the client leaves, a read fails, or the hub evicts us.
/// Client payloads are never interpreted.
async fn keep_alive<C: Connection>(
    conn: &C,
    evicted: &mut watch::Receiver<bool>,
    owner: OwnerId,
) {
    let id = conn.id();
    loop {
        tokio::select! {
            read = conn.recv() => match read {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tracing::info!(session = %id, %owner, "connection closed by client");
                    return;
                }
                Err(e) => {
                    tracing::debug!(session = %id, %owner, error = %e, "read failed, ending session");
                    return;
                }
            },
            _ = evicted.wait_for(|evicted| *evicted) => {
                tracing::debug!(session = %id, %owner, "evicted by hub");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use boardsync_hub::{HubConfig, spawn_hub};
    use boardsync_session::{AuthError, JwtAuthenticator, TokenIssuer};
    use tokio::sync::{Mutex, mpsc};

    const SECRET: &[u8] = b"handler-secret";
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    /// Inbound frames come from a channel; `Err` items simulate read errors.
    struct ScriptedConnection {
        id: ConnectionId,
        inbound: Mutex<mpsc::UnboundedReceiver<io::Result<Vec<u8>>>>,
        closes: Arc<AtomicUsize>,
    }

    impl Connection for ScriptedConnection {
        type Error = io::Error;

        async fn send(&self, _text: &str) -> Result<(), io::Error> {
            Ok(())
        }

        async fn recv(&self) -> Result<Option<Vec<u8>>, io::Error> {
            match self.inbound.lock().await.recv().await {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        }

        async fn close(&self) -> Result<(), io::Error> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            self.id
        }
    }

    fn scripted() -> (
        ScriptedConnection,
        mpsc::UnboundedSender<io::Result<Vec<u8>>>,
        Arc<AtomicUsize>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let conn = ScriptedConnection {
            id: ConnectionId::new(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            inbound: Mutex::new(rx),
            closes: Arc::clone(&closes),
        };
        (conn, tx, closes)
    }

    fn token_for(owner: OwnerId) -> String {
        TokenIssuer::new(SECRET).issue(owner, "a@b.c", "g").unwrap()
    }

    /// Polls until the hub reports `expected` sessions for `owner`.
    async fn wait_for_count(
        hub: &HubHandle<ScriptedConnection>,
        owner: OwnerId,
        expected: usize,
    ) {
        for _ in 0..100 {
            if hub.session_count(owner).await.unwrap() == expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("owner never reached {expected} sessions");
    }

    /// Closes after an unregister run off the hub actor.
    async fn wait_for_closes(closes: &AtomicUsize, expected: usize) {
        for _ in 0..100 {
            if closes.load(Ordering::SeqCst) == expected {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("expected {expected} closes");
    }

    #[tokio::test]
    async fn test_handle_session_missing_token_closes_without_registering() {
        let hub = spawn_hub(HubConfig::default());
        let (conn, _tx, closes) = scripted();

        let err = handle_session(conn, None, &JwtAuthenticator::new(SECRET), &hub)
            .await
            .unwrap_err();

        assert!(matches!(err, BoardSyncError::Auth(AuthError::MissingCredential)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(hub.stats().await.unwrap().sessions, 0);
    }

    #[tokio::test]
    async fn test_handle_session_registers_then_unregisters_on_client_close() {
        let hub = spawn_hub(HubConfig::default());
        let owner = OwnerId::generate();
        let (conn, tx, closes) = scripted();

        let task = {
            let hub = hub.clone();
            let token = token_for(owner);
            tokio::spawn(async move {
                handle_session(conn, Some(token), &JwtAuthenticator::new(SECRET), &hub).await
            })
        };

        wait_for_count(&hub, owner, 1).await;
        tx.send(Ok(b"ping".to_vec())).unwrap();
        drop(tx);

        task.await.unwrap().unwrap();
        wait_for_count(&hub, owner, 0).await;
        wait_for_closes(&closes, 1).await;
    }

    #[tokio::test]
    async fn test_handle_session_read_error_unregisters_once() {
        let hub = spawn_hub(HubConfig::default());
        let owner = OwnerId::generate();
        let (conn, tx, closes) = scripted();
        let id = conn.id();

        tx.send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
            .unwrap();
        let auth = JwtAuthenticator::new(SECRET);
        handle_session(conn, Some(token_for(owner)), &auth, &hub)
            .await
            .unwrap();

        wait_for_count(&hub, owner, 0).await;
        assert!(!hub.unregister(owner, id).await.unwrap());
        wait_for_closes(&closes, 1).await;
    }

    #[tokio::test]
    async fn test_handle_session_ends_when_hub_evicts() {
        let hub = spawn_hub(HubConfig::default());
        let owner = OwnerId::generate();
        let (conn, _tx, closes) = scripted();
        let id = conn.id();

        let task = {
            let hub = hub.clone();
            let token = token_for(owner);
            tokio::spawn(async move {
                handle_session(conn, Some(token), &JwtAuthenticator::new(SECRET), &hub).await
            })
        };
        wait_for_count(&hub, owner, 1).await;

        assert!(hub.unregister(owner, id).await.unwrap());

        task.await.unwrap().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handle_session_refused_registration_closes_transport() {
        let hub = spawn_hub(HubConfig {
            max_sessions_per_owner: 0,
            ..HubConfig::default()
        });
        let owner = OwnerId::generate();
        let (conn, _tx, closes) = scripted();

        let err = handle_session(conn, Some(token_for(owner)), &JwtAuthenticator::new(SECRET), &hub)
            .await
            .unwrap_err();

        assert!(matches!(err, BoardSyncError::Hub(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
