// Task list store: ordered tasks, undoable deletes, persistence after every change

use crate::error::TaskError;
use crate::filter::{Filter, FilteredView};
use crate::persist;
use crate::storage::KeyValueStore;
use crate::task::{IdAllocator, Task, TaskId};
use crate::timer::{Countdown, Scheduler};
use eyre::Result;
use std::time::Duration;
use tracing::{debug, info};

/// How long a deleted task can be restored
pub const DEFAULT_UNDO_WINDOW: Duration = Duration::from_secs(3);

/// Settings for opening a [`TaskList`]
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Storage key the full list is written under
    pub key: String,
    pub undo_window: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            key: persist::DEFAULT_KEY.to_string(),
            undo_window: DEFAULT_UNDO_WINDOW,
        }
    }
}

/// The most recently deleted task, restorable until its countdown runs out
#[derive(Debug)]
struct DeletedSlot {
    task: Task,
    original_index: usize,
    countdown: Countdown,
}

/// Ordered task list backed by a key-value store
///
/// Every successful mutation writes the whole list back to storage. If that
/// write fails the in-memory change stays applied and the error is returned.
pub struct TaskList<S: KeyValueStore, T: Scheduler> {
    storage: S,
    scheduler: T,
    options: StoreOptions,
    tasks: Vec<Task>,
    ids: IdAllocator,
    deleted: Option<DeletedSlot>,
}

impl<S: KeyValueStore, T: Scheduler> TaskList<S, T> {
    /// Load the list from `storage` with default options
    pub fn open(storage: S, scheduler: T) -> Result<Self> {
        Self::open_with(storage, scheduler, StoreOptions::default())
    }

    /// Load the list from `storage`
    ///
    /// A missing or unreadable payload starts an empty list.
    pub fn open_with(storage: S, scheduler: T, options: StoreOptions) -> Result<Self> {
        let tasks = persist::load_tasks(&storage, &options.key)?;
        let ids = IdAllocator::seeded(&tasks);

        info!(key = %options.key, count = tasks.len(), "Opened task list");

        Ok(Self {
            storage,
            scheduler,
            options,
            tasks,
            ids,
            deleted: None,
        })
    }

    // ========================================================================
    // Read access
    // ========================================================================

    /// All tasks in display order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Tasks selected by `filter`, in list order
    pub fn filtered_view(&self, filter: Filter) -> FilteredView<'_> {
        filter.apply(&self.tasks)
    }

    /// The deleted task that `undo_delete` would restore right now
    pub fn pending_undo(&self) -> Option<&Task> {
        self.deleted
            .as_ref()
            .filter(|slot| !self.scheduler.is_expired(slot.countdown))
            .map(|slot| &slot.task)
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn scheduler_mut(&mut self) -> &mut T {
        &mut self.scheduler
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a new uncompleted task
    ///
    /// Blank input is ignored and returns `None`.
    pub fn add(&mut self, text: &str) -> Result<Option<TaskId>> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring blank task");
            return Ok(None);
        }

        let id = self.ids.allocate();
        self.tasks.push(Task::new(id, text));
        debug!(%id, "Added task");

        self.persist()?;
        Ok(Some(id))
    }

    /// Flip completion of the task with `id`; returns false if there is none
    pub fn toggle_complete(&mut self, id: TaskId) -> Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(%id, "toggle_complete: no such task");
            return Ok(false);
        };

        task.is_completed = !task.is_completed;
        debug!(%id, completed = task.is_completed, "Toggled task");

        self.persist()?;
        Ok(true)
    }

    /// Replace the text of the task with `id`
    ///
    /// Blank text fails with [`TaskError::EmptyInput`] and changes nothing.
    /// Returns false if there is no such task.
    pub fn update(&mut self, id: TaskId, new_text: &str) -> Result<bool> {
        let text = new_text.trim();
        if text.is_empty() {
            return Err(TaskError::EmptyInput.into());
        }

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(%id, "update: no such task");
            return Ok(false);
        };

        task.text = text.to_string();
        debug!(%id, "Updated task text");

        self.persist()?;
        Ok(true)
    }

    /// Remove the task with `id` and hold it for undo
    ///
    /// A previously deleted task that was still restorable is discarded.
    /// Returns false if there is no such task.
    pub fn delete(&mut self, id: TaskId) -> Result<bool> {
        let Some(index) = self.tasks.iter().position(|t| t.id == id) else {
            debug!(%id, "delete: no such task");
            return Ok(false);
        };

        let task = self.tasks.remove(index);
        if let Some(previous) = self.deleted.take() {
            self.scheduler.cancel(previous.countdown);
            debug!(id = %previous.task.id, "Superseded pending undo");
        }

        let countdown = self.scheduler.arm(self.options.undo_window);
        self.deleted = Some(DeletedSlot {
            task,
            original_index: index,
            countdown,
        });
        info!(%id, index, "Deleted task");

        self.persist()?;
        Ok(true)
    }

    /// Restore the most recently deleted task to the end of the list
    ///
    /// Returns `None` if nothing is pending or the undo window has passed.
    pub fn undo_delete(&mut self) -> Result<Option<TaskId>> {
        let Some(slot) = self.deleted.take() else {
            return Ok(None);
        };

        let expired = self.scheduler.is_expired(slot.countdown);
        self.scheduler.cancel(slot.countdown);
        if expired {
            debug!(id = %slot.task.id, "Undo window has passed");
            return Ok(None);
        }

        let id = slot.task.id;
        self.tasks.push(slot.task);
        info!(%id, original_index = slot.original_index, "Restored deleted task");

        self.persist()?;
        Ok(Some(id))
    }

    /// Drop the pending deleted task once its countdown has run out
    ///
    /// Meant to be called by the event loop between events. Returns the task
    /// that can no longer be restored.
    pub fn expire_pending(&mut self) -> Option<Task> {
        let expired = self
            .deleted
            .as_ref()
            .is_some_and(|slot| self.scheduler.is_expired(slot.countdown));
        if !expired {
            return None;
        }

        let slot = self.deleted.take()?;
        self.scheduler.cancel(slot.countdown);
        debug!(id = %slot.task.id, "Undo window closed");
        Some(slot.task)
    }

    /// Move the task at `from` so it ends up at `to`
    ///
    /// Both indices refer to the full list. Out-of-range indices fail with
    /// [`TaskError::IndexOutOfRange`] and leave the list untouched.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.tasks.len();
        for index in [from, to] {
            if index >= len {
                return Err(TaskError::IndexOutOfRange { index, len }.into());
            }
        }
        if from == to {
            return Ok(());
        }

        let task = self.tasks.remove(from);
        self.tasks.insert(to, task);
        debug!(from, to, "Reordered task");

        self.persist()
    }

    /// Reorder using positions within the view selected by `filter`
    ///
    /// The dragged task takes the list position of the task it was dropped
    /// on. With [`Filter::All`] this is the same as [`TaskList::reorder`].
    pub fn reorder_visible(&mut self, filter: Filter, from: usize, to: usize) -> Result<()> {
        let positions = filter.positions(&self.tasks);
        let lookup = |index: usize| {
            positions.get(index).copied().ok_or(TaskError::IndexOutOfRange {
                index,
                len: positions.len(),
            })
        };

        let from = lookup(from)?;
        let to = lookup(to)?;
        self.reorder(from, to)
    }

    /// Replace the whole list
    ///
    /// Blank tasks and repeated ids are dropped. Any pending undo is
    /// discarded.
    pub fn replace_all(&mut self, tasks: Vec<Task>) -> Result<()> {
        if let Some(previous) = self.deleted.take() {
            self.scheduler.cancel(previous.countdown);
        }

        self.tasks = persist::sanitize(tasks);
        for task in &self.tasks {
            self.ids.observe(task.id);
        }
        info!(count = self.tasks.len(), "Replaced task list");

        self.persist()
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn persist(&mut self) -> Result<()> {
        persist::save_tasks(&mut self.storage, &self.options.key, &self.tasks)
    }
}

impl<S: KeyValueStore, T: Scheduler> Drop for TaskList<S, T> {
    fn drop(&mut self) {
        if let Some(slot) = self.deleted.take() {
            self.scheduler.cancel(slot.countdown);
            debug!(id = %slot.task.id, "Cancelled pending undo on teardown");
        }
    }
}
