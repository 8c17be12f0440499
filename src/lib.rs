// todolist - Ordered task list with undoable deletes, persisted to a key-value store

pub mod config;
pub mod error;
pub mod filter;
pub mod item;
pub mod jsonl;
pub mod persist;
pub mod storage;
pub mod store;
pub mod task;
pub mod timer;

// Re-export main types for convenience
pub use config::Config;
pub use error::{TaskError, task_error};
pub use filter::{Filter, FilteredView};
pub use item::{EditMode, TaskItem};
pub use storage::{Backend, FileStorage, KeyValueStore, MemoryStorage, SqliteStorage, open_backend};
pub use store::{DEFAULT_UNDO_WINDOW, StoreOptions, TaskList};
pub use task::{Task, TaskId, now_ms};
pub use timer::{Countdown, ManualScheduler, Scheduler, SystemScheduler};
