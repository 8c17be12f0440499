// Edit-mode state machine for a single rendered task

use crate::error::TaskError;
use crate::storage::KeyValueStore;
use crate::store::TaskList;
use crate::task::TaskId;
use crate::timer::Scheduler;
use eyre::Result;

/// Whether a task row shows its text or an input box
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Viewing,
    /// `buffer` holds the text being typed, not yet saved
    Editing { buffer: String },
}

/// Presentation state of one task row
///
/// Transitions take `self` by value and return the next state; nothing here
/// touches the store except [`TaskItem::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    id: TaskId,
    mode: EditMode,
    error: Option<TaskError>,
}

impl TaskItem {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            mode: EditMode::Viewing,
            error: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn mode(&self) -> &EditMode {
        &self.mode
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, EditMode::Editing { .. })
    }

    /// Text in the edit box, while editing
    pub fn buffer(&self) -> Option<&str> {
        match &self.mode {
            EditMode::Editing { buffer } => Some(buffer),
            EditMode::Viewing => None,
        }
    }

    /// Inline error from the last save attempt
    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    /// Enter editing with the buffer seeded from `current_text`
    ///
    /// Ignored while already editing so typed text is not lost.
    pub fn begin_edit(self, current_text: &str) -> Self {
        match self.mode {
            EditMode::Viewing => Self {
                mode: EditMode::Editing {
                    buffer: current_text.to_string(),
                },
                error: None,
                ..self
            },
            EditMode::Editing { .. } => self,
        }
    }

    /// Replace the buffer contents; ignored while viewing
    pub fn set_buffer(self, text: impl Into<String>) -> Self {
        match self.mode {
            EditMode::Editing { .. } => Self {
                mode: EditMode::Editing { buffer: text.into() },
                ..self
            },
            EditMode::Viewing => self,
        }
    }

    /// Try to leave editing
    ///
    /// Returns the trimmed text to write to the store alongside the new
    /// state. A blank buffer keeps the row in editing with
    /// [`TaskError::EmptyInput`] set and returns no text.
    pub fn save(self) -> (Self, Option<String>) {
        let EditMode::Editing { buffer } = &self.mode else {
            return (self, None);
        };

        let text = buffer.trim();
        if text.is_empty() {
            return (
                Self {
                    error: Some(TaskError::EmptyInput),
                    ..self
                },
                None,
            );
        }

        let text = text.to_string();
        (
            Self {
                mode: EditMode::Viewing,
                error: None,
                ..self
            },
            Some(text),
        )
    }

    /// Leave editing and throw the buffer away
    pub fn cancel(self) -> Self {
        Self {
            mode: EditMode::Viewing,
            error: None,
            ..self
        }
    }

    /// Save and write the result to `list`
    ///
    /// A task that vanished from the list while being edited is not an
    /// error; the row simply returns to viewing.
    pub fn commit<S: KeyValueStore, T: Scheduler>(self, list: &mut TaskList<S, T>) -> Result<Self> {
        let (next, text) = self.save();
        if let Some(text) = text {
            list.update(next.id, &text)?;
        }
        Ok(next)
    }
}
