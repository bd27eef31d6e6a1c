//! A live session: an admitted connection bound to its owner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use boardsync_protocol::OwnerId;
use boardsync_transport::{Connection, ConnectionId};
use tokio::sync::watch;

/// An authenticated connection registered under one owner.
///
/// The connection handle is shared with the lifecycle task that reads
/// keep-alive frames, but only the hub writes to it. The underlying
/// transport is closed at most once no matter how many paths race to
/// close it.
pub struct Session<C: Connection> {
    owner: OwnerId,
    conn: Arc<C>,
    closed: AtomicBool,
    evicted: watch::Sender<bool>,
}

impl<C: Connection> Session<C> {
    pub fn new(owner: OwnerId, conn: Arc<C>) -> Self {
        let (evicted, _) = watch::channel(false);
        Self {
            owner,
            conn,
            closed: AtomicBool::new(false),
            evicted,
        }
    }

    /// The session's identity within its owner's set.
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Pushes one text frame to the client.
    pub async fn send(&self, text: &str) -> Result<(), C::Error> {
        self.conn.send(text).await
    }

    /// Closes the transport.
    ///
    /// Returns `Ok(true)` if this call performed the close and `Ok(false)`
    /// if the session was already closed.
    pub async fn close(&self) -> Result<bool, C::Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        tracing::debug!(session = %self.id(), owner = %self.owner, "closing transport");
        self.conn.close().await.map(|()| true)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Signals the lifecycle task that the hub has dropped this session.
    pub fn mark_evicted(&self) {
        self.evicted.send_replace(true);
    }

    /// Subscribes to the eviction signal. The value flips to `true` once.
    pub fn evicted(&self) -> watch::Receiver<bool> {
        self.evicted.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::AtomicUsize;

    struct CountingConnection {
        closes: AtomicUsize,
    }

    impl Connection for CountingConnection {
        type Error = io::Error;

        async fn send(&self, _text: &str) -> Result<(), io::Error> {
            Ok(())
        }

        async fn recv(&self) -> Result<Option<Vec<u8>>, io::Error> {
            Ok(None)
        }

        async fn close(&self) -> Result<(), io::Error> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            ConnectionId::new(9)
        }
    }

    fn session() -> (Session<CountingConnection>, Arc<CountingConnection>) {
        let conn = Arc::new(CountingConnection {
            closes: AtomicUsize::new(0),
        });
        let owner = "64b7f0c2a1e4d3b2c1a09f8e".parse().unwrap();
        (Session::new(owner, Arc::clone(&conn)), conn)
    }

    #[tokio::test]
    async fn test_close_twice_closes_transport_once() {
        let (session, conn) = session();
        assert!(session.close().await.unwrap());
        assert!(!session.close().await.unwrap());
        assert_eq!(conn.closes.load(Ordering::SeqCst), 1);
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_mark_evicted_wakes_subscriber() {
        let (session, _conn) = session();
        let mut rx = session.evicted();
        assert!(!*rx.borrow());
        session.mark_evicted();
        rx.wait_for(|evicted| *evicted).await.unwrap();
    }

    #[test]
    fn test_subscribe_after_eviction_sees_true() {
        let (session, _conn) = session();
        session.mark_evicted();
        assert!(*session.evicted().borrow());
    }

    #[test]
    fn test_id_comes_from_connection() {
        let (session, _conn) = session();
        assert_eq!(session.id(), ConnectionId::new(9));
    }
}
