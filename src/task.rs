// Task data model

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a task: the creation time in milliseconds since the epoch
///
/// Ids are unique within a list and increase with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Local creation time encoded in the id, if it is a valid timestamp
    pub fn created_at(self) -> Option<DateTime<Local>> {
        DateTime::from_timestamp_millis(self.0).map(|utc| utc.with_timezone(&Local))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TaskId)
    }
}

/// A single to-do item
///
/// Serialized with the field names of the persisted payload:
/// `{"id": 1700000000000, "text": "Buy milk", "isCompleted": false}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub is_completed: bool,
}

impl Task {
    /// Create an uncompleted task. `text` is stored as given; callers trim.
    pub fn new(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            is_completed: false,
        }
    }
}

/// Hands out task ids derived from the wall clock
///
/// Two allocations in the same millisecond, or a clock that steps
/// backwards, still yield strictly increasing ids.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    last: i64,
}

impl IdAllocator {
    /// Start allocating above every id already in `tasks`
    pub fn seeded<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let last = tasks.into_iter().map(|t| t.id.0).max().unwrap_or(0);
        Self { last }
    }

    /// Next id for a task created at `now_ms`
    pub fn next_at(&mut self, now_ms: i64) -> TaskId {
        self.last = now_ms.max(self.last + 1);
        TaskId(self.last)
    }

    pub fn allocate(&mut self) -> TaskId {
        self.next_at(now_ms())
    }

    /// Make sure future ids stay above `id`
    pub fn observe(&mut self, id: TaskId) {
        self.last = self.last.max(id.0);
    }
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
