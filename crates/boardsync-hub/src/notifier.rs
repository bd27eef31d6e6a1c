//! Entry point for the CRUD layer to report committed task changes.

use boardsync_protocol::{ChangeEvent, ChangeKind, OwnerId, Task, TaskId};
use boardsync_transport::Connection;

use crate::HubHandle;

/// Forwards committed task changes to the hub.
///
/// Notification is fire-and-forget: nothing here returns an error, so the
/// outcome of a push can never change the outcome of the write that caused
/// it. A notifier built with [`ChangeNotifier::detached`] logs a warning and
/// drops every event.
pub struct ChangeNotifier<C: Connection> {
    hub: Option<HubHandle<C>>,
}

impl<C: Connection> Clone for ChangeNotifier<C> {
    fn clone(&self) -> Self {
        Self {
            hub: self.hub.clone(),
        }
    }
}

impl<C: Connection> ChangeNotifier<C> {
    pub fn new(hub: HubHandle<C>) -> Self {
        Self { hub: Some(hub) }
    }

    /// A notifier with no hub behind it.
    pub fn detached() -> Self {
        Self { hub: None }
    }

    pub fn is_attached(&self) -> bool {
        self.hub.is_some()
    }

    /// Hands an event to the hub for fan-out.
    pub async fn notify(&self, event: ChangeEvent) {
        let Some(hub) = &self.hub else {
            tracing::warn!(
                kind = %event.kind(),
                task = %event.task_id(),
                owner = %event.owner(),
                "hub not initialised, dropping change notification"
            );
            return;
        };
        let (kind, task) = (event.kind(), event.task_id());
        if let Err(e) = hub.dispatch(event).await {
            tracing::warn!(%kind, %task, error = %e, "dropping change notification");
        }
    }

    /// Reports one committed write.
    ///
    /// `snapshot` is the task after the write for create/update and is
    /// ignored for delete. A create/update without a matching snapshot is
    /// logged and dropped.
    pub async fn on_task_changed(
        &self,
        kind: ChangeKind,
        task_id: TaskId,
        owner: OwnerId,
        snapshot: Option<Task>,
    ) {
        match ChangeEvent::new(kind, task_id, owner, snapshot) {
            Ok(event) => self.notify(event).await,
            Err(e) => {
                tracing::warn!(%kind, task = %task_id, %owner, error = %e, "discarding malformed change event");
            }
        }
    }
}
