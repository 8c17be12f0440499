// View filtering for task lists

use crate::task::Task;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which tasks a view shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Completed,
    Uncompleted,
}

impl Filter {
    pub const ALL: [Filter; 3] = [Filter::All, Filter::Completed, Filter::Uncompleted];

    /// Whether `task` belongs in this view
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Completed => task.is_completed,
            Filter::Uncompleted => !task.is_completed,
        }
    }

    /// Label shown on the filter button
    pub fn label(self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Completed => "Completed",
            Filter::Uncompleted => "Incomplete",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "all"),
            Filter::Completed => write!(f, "completed"),
            Filter::Uncompleted => write!(f, "uncompleted"),
        }
    }
}

/// Lazy pass over a task slice yielding the tasks a filter selects
///
/// A clone walks the remaining tasks again independently, so a fresh view
/// can be iterated any number of times.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    tasks: std::slice::Iter<'a, Task>,
    filter: Filter,
}

impl<'a> Iterator for FilteredView<'a> {
    type Item = &'a Task;

    fn next(&mut self) -> Option<Self::Item> {
        let filter = self.filter;
        self.tasks.by_ref().find(|task| filter.matches(task))
    }
}

impl Filter {
    /// View of `tasks` restricted to this filter; the slice is not touched
    pub fn apply(self, tasks: &[Task]) -> FilteredView<'_> {
        FilteredView {
            tasks: tasks.iter(),
            filter: self,
        }
    }

    /// Positions in `tasks` of the tasks this filter selects, in order
    pub fn positions(self, tasks: &[Task]) -> Vec<usize> {
        tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| self.matches(task))
            .map(|(index, _)| index)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter '{0}' (expected all, completed or uncompleted)")]
pub struct ParseFilterError(String);

impl FromStr for Filter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "completed" | "done" => Ok(Filter::Completed),
            "uncompleted" | "incomplete" | "pending" => Ok(Filter::Uncompleted),
            _ => Err(ParseFilterError(s.to_string())),
        }
    }
}
