//! In-memory task board.
//!
//! A reference CRUD collaborator for the real-time core: every successful
//! write is reported to the [`ChangeNotifier`] after the write is applied,
//! and failed writes report nothing. The event is queued before the write
//! lock is released, so events for a task are queued in commit order.
//! Persistence is left to embedding applications; this board keeps tasks
//! in a map.

use std::collections::HashMap;

use boardsync_hub::ChangeNotifier;
use boardsync_protocol::{ChangeEvent, OwnerId, Task, TaskId};
use boardsync_transport::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::StoreError;

/// Client-supplied task fields. Ids and ownership are assigned by the
/// board, never taken from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
}

/// Owner-scoped task storage that reports committed writes.
pub struct TaskBoard<C: Connection> {
    tasks: RwLock<HashMap<TaskId, Task>>,
    notifier: ChangeNotifier<C>,
}

impl<C: Connection> TaskBoard<C> {
    pub fn new(notifier: ChangeNotifier<C>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            notifier,
        }
    }

    /// All tasks owned by `owner`, ordered by id.
    pub async fn list(&self, owner: OwnerId) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    pub async fn get(
        &self,
        owner: OwnerId,
        id: TaskId,
    ) -> Result<Task, StoreError> {
        let tasks = self.tasks.read().await;
        let task = owned(&tasks, owner, id)?;
        Ok(task.clone())
    }

    /// Creates a task for `owner` and notifies its sessions.
    pub async fn create(&self, owner: OwnerId, draft: TaskDraft) -> Task {
        let task = Task {
            id: TaskId::generate(),
            name: draft.name,
            description: draft.description,
            status: draft.status,
            user_id: owner,
        };
        let mut tasks = self.tasks.write().await;
        tasks.insert(task.id, task.clone());
        tracing::debug!(%owner, task = %task.id, "task created");

        self.notifier.notify(ChangeEvent::created(task.clone())).await;
        task
    }

    /// Replaces a task's fields. The task stays with `owner`.
    pub async fn update(
        &self,
        owner: OwnerId,
        id: TaskId,
        draft: TaskDraft,
    ) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().await;
        owned(&tasks, owner, id)?;
        let task = Task {
            id,
            name: draft.name,
            description: draft.description,
            status: draft.status,
            user_id: owner,
        };
        tasks.insert(id, task.clone());
        tracing::debug!(%owner, task = %id, "task updated");

        self.notifier.notify(ChangeEvent::updated(task.clone())).await;
        Ok(task)
    }

    pub async fn delete(
        &self,
        owner: OwnerId,
        id: TaskId,
    ) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        owned(&tasks, owner, id)?;
        tasks.remove(&id);
        tracing::debug!(%owner, task = %id, "task deleted");

        self.notifier.notify(ChangeEvent::deleted(id, owner)).await;
        Ok(())
    }
}

/// Looks up `id` and checks that it belongs to `owner`.
fn owned(
    tasks: &HashMap<TaskId, Task>,
    owner: OwnerId,
    id: TaskId,
) -> Result<&Task, StoreError> {
    let task = tasks.get(&id).ok_or(StoreError::NotFound(id))?;
    if task.user_id != owner {
        return Err(StoreError::AccessDenied(id));
    }
    Ok(task)
}
