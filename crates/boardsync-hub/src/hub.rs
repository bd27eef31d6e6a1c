//! The hub actor and its handle.
//!
//! The actor owns the owner → sessions map outright; nothing else touches
//! it. A [`HubHandle`] sends [`HubCommand`]s over a bounded mpsc channel
//! and, where the caller needs an answer, awaits a oneshot reply.
//!
//! Dispatch is processed to completion before the next command is taken,
//! which gives per-owner FIFO delivery: every session of an owner sees that
//! owner's events in the order they were submitted. Closing a removed
//! session's transport runs on its own task, so a wedged peer costs the
//! actor at most one `send_timeout` per dispatch cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use boardsync_protocol::{ChangeEvent, OwnerId};
use boardsync_session::Session;
use boardsync_transport::{Connection, ConnectionId};
use futures_util::future::join_all;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time;

use crate::{HubConfig, HubError, HubStats};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub(crate) enum HubCommand<C: Connection> {
    Register {
        session: Arc<Session<C>>,
        reply: oneshot::Sender<Result<(), HubError>>,
    },

    /// `reply` is `None` for fire-and-forget removal from a drop guard.
    Unregister {
        owner: OwnerId,
        id: ConnectionId,
        reply: Option<oneshot::Sender<bool>>,
    },

    Dispatch(ChangeEvent),

    SessionCount {
        owner: OwnerId,
        reply: oneshot::Sender<usize>,
    },

    Stats {
        reply: oneshot::Sender<HubStats>,
    },

    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ---------------------------------------------------------------------------
// HubHandle
// ---------------------------------------------------------------------------

/// Cloneable handle to the hub actor.
///
/// Every method fails with [`HubError::Unavailable`] once the actor has
/// stopped.
pub struct HubHandle<C: Connection> {
    sender: mpsc::Sender<HubCommand<C>>,
}

impl<C: Connection> Clone for HubHandle<C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<C: Connection> HubHandle<C> {
    /// Adds a session under its owner.
    ///
    /// Registering the same session twice is a no-op.
    pub async fn register(
        &self,
        session: Arc<Session<C>>,
    ) -> Result<(), HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Register {
            session,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)?
    }

    /// Removes a session and closes its transport.
    ///
    /// Returns `false` if the session was not registered. When this
    /// returns the transport has been closed (or the close timed out).
    /// The actor itself never waits on the close.
    pub async fn unregister(
        &self,
        owner: OwnerId,
        id: ConnectionId,
    ) -> Result<bool, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Unregister {
            owner,
            id,
            reply: Some(reply_tx),
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Queues an unregister without waiting. Safe to call from `Drop`.
    ///
    /// If the queue is full the command is handed to a spawned task so it
    /// still lands after everything already queued.
    pub fn schedule_unregister(&self, owner: OwnerId, id: ConnectionId) {
        let cmd = HubCommand::Unregister {
            owner,
            id,
            reply: None,
        };
        match self.sender.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        let sender = self.sender.clone();
                        runtime.spawn(async move {
                            let _ = sender.send(cmd).await;
                        });
                    }
                    Err(_) => {
                        tracing::warn!(
                            %owner,
                            session = %id,
                            "no runtime to queue unregister, dropping it"
                        );
                    }
                }
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(%owner, session = %id, "hub stopped, skipping unregister");
            }
        }
    }

    /// Queues an event for fan-out to its owner's sessions.
    ///
    /// Returns once the event is queued, not once it is delivered.
    pub async fn dispatch(&self, event: ChangeEvent) -> Result<(), HubError> {
        self.send(HubCommand::Dispatch(event)).await
    }

    /// Number of live sessions for `owner`.
    pub async fn session_count(
        &self,
        owner: OwnerId,
    ) -> Result<usize, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::SessionCount {
            owner,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }

    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Stats { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Closes every session and stops the actor.
    ///
    /// Commands queued before the shutdown are processed first.
    pub async fn shutdown(&self) -> Result<(), HubError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Shutdown { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, cmd: HubCommand<C>) -> Result<(), HubError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| HubError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// HubActor
// ---------------------------------------------------------------------------

struct HubActor<C: Connection> {
    config: HubConfig,
    owners: HashMap<OwnerId, HashMap<ConnectionId, Arc<Session<C>>>>,
    receiver: mpsc::Receiver<HubCommand<C>>,
}

impl<C: Connection> HubActor<C> {
    async fn run(mut self) {
        tracing::info!("hub actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                HubCommand::Register { session, reply } => {
                    let _ = reply.send(self.handle_register(session));
                }
                HubCommand::Unregister { owner, id, reply } => {
                    self.handle_unregister(owner, id, reply);
                }
                HubCommand::Dispatch(event) => {
                    self.handle_dispatch(event).await;
                }
                HubCommand::SessionCount { owner, reply } => {
                    let count = self.owners.get(&owner).map_or(0, HashMap::len);
                    let _ = reply.send(count);
                }
                HubCommand::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
                HubCommand::Shutdown { reply } => {
                    self.handle_shutdown().await;
                    let _ = reply.send(());
                    break;
                }
            }
        }

        tracing::info!("hub actor stopped");
    }

    fn handle_register(
        &mut self,
        session: Arc<Session<C>>,
    ) -> Result<(), HubError> {
        let owner = session.owner();
        let id = session.id();
        let sessions = self.owners.entry(owner).or_default();

        if sessions.contains_key(&id) {
            tracing::debug!(%owner, session = %id, "session already registered");
            return Ok(());
        }
        let limit = self.config.max_sessions_per_owner;
        if sessions.len() >= limit {
            if sessions.is_empty() {
                self.owners.remove(&owner);
            }
            tracing::warn!(%owner, session = %id, limit, "owner at session limit, refusing");
            return Err(HubError::OwnerAtCapacity(owner, limit));
        }

        sessions.insert(id, session);
        tracing::info!(
            %owner,
            session = %id,
            sessions = sessions.len(),
            "session registered"
        );
        Ok(())
    }

    fn handle_unregister(
        &mut self,
        owner: OwnerId,
        id: ConnectionId,
        reply: Option<oneshot::Sender<bool>>,
    ) {
        let Some(session) = self.remove(owner, id) else {
            tracing::debug!(%owner, session = %id, "unregister for unknown session");
            if let Some(reply) = reply {
                let _ = reply.send(false);
            }
            return;
        };
        self.retire(session, reply);
    }

    async fn handle_dispatch(&mut self, event: ChangeEvent) {
        let owner = event.owner();
        let targets: Vec<Arc<Session<C>>> = match self.owners.get(&owner) {
            Some(sessions) => sessions.values().cloned().collect(),
            None => {
                tracing::debug!(
                    %owner,
                    kind = %event.kind(),
                    task = %event.task_id(),
                    "no live sessions for owner, dropping event"
                );
                return;
            }
        };

        let text: Arc<str> = match event.encode() {
            Ok(text) => text.into(),
            Err(e) => {
                tracing::warn!(%owner, error = %e, "failed to encode change event");
                return;
            }
        };

        let limit = self.config.send_timeout;
        let outcomes = join_all(
            targets
                .into_iter()
                .map(|session| push(session, Arc::clone(&text), limit)),
        )
        .await;

        let mut delivered = 0usize;
        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    tracing::warn!(%owner, session = %id, %reason, "push failed, dropping session");
                    if let Some(session) = self.remove(owner, id) {
                        self.retire(session, None);
                    }
                }
            }
        }
        tracing::debug!(
            %owner,
            kind = %event.kind(),
            task = %event.task_id(),
            delivered,
            "dispatched change event"
        );
    }

    async fn handle_shutdown(&mut self) {
        let sessions: Vec<Arc<Session<C>>> = self
            .owners
            .drain()
            .flat_map(|(_, sessions)| sessions.into_values())
            .collect();
        tracing::info!(sessions = sessions.len(), "hub shutting down");
        let limit = self.config.send_timeout;
        join_all(sessions.iter().map(|session| {
            session.mark_evicted();
            close_session(session, limit)
        }))
        .await;
    }

    /// Removes a session from the map, dropping the owner's entry once it
    /// is empty.
    fn remove(
        &mut self,
        owner: OwnerId,
        id: ConnectionId,
    ) -> Option<Arc<Session<C>>> {
        let sessions = self.owners.get_mut(&owner)?;
        let session = sessions.remove(&id)?;
        let remaining = sessions.len();
        if remaining == 0 {
            self.owners.remove(&owner);
        }
        tracing::info!(%owner, session = %id, remaining, "session unregistered");
        Some(session)
    }

    /// Stops the session's reader and closes its transport on a separate
    /// task. `reply`, if any, is answered once the close has finished.
    fn retire(
        &self,
        session: Arc<Session<C>>,
        reply: Option<oneshot::Sender<bool>>,
    ) {
        session.mark_evicted();
        let limit = self.config.send_timeout;
        tokio::spawn(async move {
            close_session(&session, limit).await;
            if let Some(reply) = reply {
                let _ = reply.send(true);
            }
        });
    }

    fn stats(&self) -> HubStats {
        HubStats {
            owners: self.owners.len(),
            sessions: self.owners.values().map(HashMap::len).sum(),
        }
    }
}

/// Pushes one frame to one session, bounded by `limit`.
async fn push<C: Connection>(
    session: Arc<Session<C>>,
    text: Arc<str>,
    limit: Duration,
) -> (ConnectionId, Result<(), String>) {
    let outcome = match time::timeout(limit, session.send(&text)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("send timed out after {limit:?}")),
    };
    (session.id(), outcome)
}

/// Closes the session's transport, bounded by `limit`.
async fn close_session<C: Connection>(session: &Session<C>, limit: Duration) {
    match time::timeout(limit, session.close()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::debug!(session = %session.id(), error = %e, "error closing transport");
        }
        Err(_) => {
            tracing::debug!(session = %session.id(), "timed out closing transport");
        }
    }
}

/// Spawns the hub actor on the current tokio runtime.
pub fn spawn_hub<C: Connection>(config: HubConfig) -> HubHandle<C> {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = HubActor::<C> {
        config,
        owners: HashMap::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    HubHandle { sender: tx }
}
