//! Todo tracking tools for agents
//!
//! A [`TodoToolset`] lets the model keep a task list with statuses and
//! dependencies. Dependencies always form an acyclic graph and never point at
//! deleted todos. Every tool answers with plain text, since the caller is a
//! language model.
//!
//! # Example
//!
//! ```rust,ignore
//! use techne_core::todos::TodoToolset;
//!
//! // fresh state for every run
//! let toolset = TodoToolset::new();
//!
//! // state shared by every run using this storage
//! let shared = Arc::new(InMemoryTodoStorage::new());
//! let toolset = TodoToolset::with_storage(shared);
//! ```

mod storage;
mod toolset;

pub use storage::{BoxedTodoStorage, InMemoryTodoStorage, TodoStorage};
pub use toolset::TodoToolset;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress of a todo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    /// Checkbox shown in listings
    pub fn glyph(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "[ ]",
            TodoStatus::InProgress => "[~]",
            TodoStatus::Completed => "[x]",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoStatus::Pending => write!(f, "pending"),
            TodoStatus::InProgress => write!(f, "in_progress"),
            TodoStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A single todo item tracked by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Assigned by storage, starting at 1
    pub id: u64,

    /// Task description
    pub content: String,

    pub status: TodoStatus,

    /// Present continuous form shown while in progress ("Running tests")
    pub active_form: String,

    /// Ids of prerequisite todos
    #[serde(default)]
    pub depends_on: Vec<u64>,
}

/// Render todos one per line, or `No todos.` when there are none
///
/// ```text
/// [x] 1: Setup DB
/// [~] 2: Run migrations | Running migrations
/// [ ] 3: Deploy (blocked by: 2)
/// ```
pub fn format_todo_list(todos: &[Todo]) -> String {
    if todos.is_empty() {
        return "No todos.".to_string();
    }

    let completed: HashSet<u64> = todos
        .iter()
        .filter(|todo| todo.status == TodoStatus::Completed)
        .map(|todo| todo.id)
        .collect();

    todos
        .iter()
        .map(|todo| {
            let mut line = format!("{} {}: {}", todo.status.glyph(), todo.id, todo.content);
            if todo.status == TodoStatus::InProgress {
                line.push_str(" | ");
                line.push_str(&todo.active_form);
            }
            let blocked_by: Vec<String> = todo
                .depends_on
                .iter()
                .filter(|id| !completed.contains(id))
                .map(u64::to_string)
                .collect();
            if !blocked_by.is_empty() {
                line.push_str(&format!(" (blocked by: {})", blocked_by.join(", ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests;
