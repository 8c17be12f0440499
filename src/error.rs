// Domain errors raised by the task list

use crate::task::TaskId;

/// Conditions the store reports to its callers
///
/// These travel inside `eyre::Report`; use `downcast_ref::<TaskError>()`
/// to tell them apart from storage failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Task text cannot be empty")]
    EmptyInput,

    #[error("No task with id {0}")]
    NotFound(TaskId),

    #[error("Index {index} is out of range for a list of {len} tasks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Persisted task list is malformed: {0}")]
    MalformedPersistedState(String),
}

/// Find the domain error inside a report, if there is one
pub fn task_error(report: &eyre::Report) -> Option<&TaskError> {
    report.downcast_ref::<TaskError>()
}
