use std::fmt;

use tangle_core::{Mappable, Shared};

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Mappable)]
pub enum TaskState {
    #[default]
    #[tangle(rename = "todo")]
    Todo,
    #[tangle(rename = "in-progress")]
    InProgress,
    #[tangle(rename = "completed")]
    Completed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Todo => write!(f, "todo"),
            TaskState::InProgress => write!(f, "in progress"),
            TaskState::Completed => write!(f, "completed"),
        }
    }
}

/// One entry of the board's doubly linked list.
#[derive(Debug, Default, Mappable)]
pub struct Task {
    pub id: u32,
    pub name: String,
    pub state: TaskState,
    pub prev: Option<Shared<Task>>,
    pub next: Option<Shared<Task>>,
}

impl Task {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Task {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Marker shown next to the task in a list.
    pub fn symbol(&self, selected: Option<u32>) -> char {
        if selected == Some(self.id) { '*' } else { ' ' }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangle_core::{Node, serialize};

    #[test]
    fn symbol_marks_selection() {
        let task = Task::new(4, "write");
        assert_eq!(task.symbol(Some(4)), '*');
        assert_eq!(task.symbol(Some(5)), ' ');
        assert_eq!(task.symbol(None), ' ');
    }

    #[test]
    fn state_serializes_as_name() {
        assert_eq!(
            serialize(&TaskState::InProgress).unwrap(),
            Node::scalar(1, "in-progress")
        );
        assert_eq!(TaskState::InProgress.to_string(), "in progress");
    }

    #[test]
    fn new_task_is_todo_and_unlinked() {
        let task = Task::new(1, "plan");
        assert_eq!(task.state, TaskState::Todo);
        assert!(task.prev.is_none() && task.next.is_none());
    }
}
