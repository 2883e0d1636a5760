//! The task list: a doubly linked list of shared tasks with a cursor.

use std::collections::HashSet;

use log::{debug, warn};
use tangle_core::Shared;

use crate::error::BoardError;
use crate::ids::IdAllocator;
use crate::task::{Task, TaskState};

/// A doubly linked list of tasks, newest first, with one selected task.
///
/// Neighbors point at each other through [`Shared`] handles, so the list is
/// a cyclic graph; dropping the board unlinks every task.
#[derive(Debug, Default)]
pub struct Board {
    root: Option<Shared<Task>>,
    selected: Option<Shared<Task>>,
    ids: IdAllocator,
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allocator(ids: IdAllocator) -> Self {
        Board {
            root: None,
            selected: None,
            ids,
        }
    }

    /// Pushes a new task to the front of the list and selects it.
    pub fn add_task(&mut self, name: impl Into<String>) -> Result<Shared<Task>, BoardError> {
        let task = Shared::new(Task::new(self.ids.new_id()?, name));
        if let Some(root) = self.root.take() {
            root.write().prev = Some(task.clone());
            task.write().next = Some(root);
        }
        self.root = Some(task.clone());
        self.selected = Some(task.clone());
        Ok(task)
    }

    /// Tasks in list order, head first. Stops at a task already listed.
    pub fn tasks(&self) -> Vec<Shared<Task>> {
        let mut seen = HashSet::new();
        let mut tasks = Vec::new();
        let mut current = self.root.clone();
        while let Some(task) = current {
            if !seen.insert(task.handle()) {
                warn!("task list loops back to task {}", task.read().id);
                break;
            }
            current = task.read().next.clone();
            tasks.push(task);
        }
        tasks
    }

    pub fn has_tasks(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Shared<Task>> {
        self.root.as_ref()
    }

    pub fn current_task(&self) -> Option<Shared<Task>> {
        self.selected.clone()
    }

    pub fn selected_task_id(&self) -> Option<u32> {
        self.selected.as_ref().map(|task| task.read().id)
    }

    pub fn select_next(&mut self) {
        let next = self.selected.as_ref().and_then(|task| task.read().next.clone());
        if next.is_some() {
            self.selected = next;
        }
    }

    pub fn select_previous(&mut self) {
        let prev = self.selected.as_ref().and_then(|task| task.read().prev.clone());
        if prev.is_some() {
            self.selected = prev;
        }
    }

    /// Moves the selected task to `state`.
    pub fn set_state(&mut self, state: TaskState) -> Result<(), BoardError> {
        let task = self.selected.as_ref().ok_or(BoardError::NoSelection)?;
        let mut task = task.write();
        if task.state == state {
            return Err(BoardError::AlreadyInState(state));
        }
        task.state = state;
        Ok(())
    }

    pub fn move_to_todo(&mut self) -> Result<(), BoardError> {
        self.set_state(TaskState::Todo)
    }

    pub fn move_to_in_progress(&mut self) -> Result<(), BoardError> {
        self.set_state(TaskState::InProgress)
    }

    pub fn move_to_completed(&mut self) -> Result<(), BoardError> {
        self.set_state(TaskState::Completed)
    }

    /// Removes the selected task and selects a neighbor, the next one first.
    pub fn delete_selected(&mut self) -> Result<(), BoardError> {
        let task = self.selected.clone().ok_or(BoardError::NoSelection)?;
        self.selected = self.unlink(&task);
        Ok(())
    }

    /// Removes the task with `id` and selects a neighbor, the next one first.
    pub fn delete_by_id(&mut self, id: u32) -> Result<(), BoardError> {
        let task = self.find(id).ok_or(BoardError::NotFound(id))?;
        self.selected = self.unlink(&task);
        Ok(())
    }

    pub fn find(&self, id: u32) -> Option<Shared<Task>> {
        self.tasks().into_iter().find(|task| task.read().id == id)
    }

    /// Replaces the list with the one containing `root`, as loaded from disk.
    ///
    /// Selects the head and marks every id as used. A list whose links loop
    /// or are not mirrored is rejected, unlinked, and the board is left as
    /// it was.
    pub fn restore(&mut self, root: Shared<Task>) -> Result<(), BoardError> {
        let tasks = match linked_list(&root) {
            Ok(tasks) => tasks,
            Err(err) => {
                sever(&root);
                return Err(err);
            }
        };

        self.clear();
        for task in &tasks {
            self.ids.mark_used(task.read().id);
        }
        self.root = tasks.first().cloned();
        self.selected = tasks.first().cloned();
        debug!("restored {} tasks", tasks.len());
        Ok(())
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    /// Detaches `task` from its neighbors, releases its id and returns the
    /// neighbor that should become selected.
    fn unlink(&mut self, task: &Shared<Task>) -> Option<Shared<Task>> {
        let (id, prev, next) = {
            let mut task = task.write();
            (task.id, task.prev.take(), task.next.take())
        };

        if let Some(prev) = &prev {
            prev.write().next = next.clone();
        }
        if let Some(next) = &next {
            next.write().prev = prev.clone();
        }
        if self.root.as_ref().is_some_and(|root| root.ptr_eq(task)) {
            self.root = next.clone();
        }
        self.ids.release(id);
        debug!("deleted task {id}");

        next.or(prev)
    }

    fn clear(&mut self) {
        self.selected = None;
        let mut current = self.root.take();
        while let Some(task) = current {
            let mut task = task.write();
            task.prev = None;
            current = task.next.take();
        }
    }
}

/// Collects the list containing `task`, head first.
fn linked_list(task: &Shared<Task>) -> Result<Vec<Shared<Task>>, BoardError> {
    let corrupt = |task: &Shared<Task>| BoardError::CorruptList(task.read().id);

    let mut seen = HashSet::from([task.handle()]);
    let mut head = task.clone();
    loop {
        let prev = head.read().prev.clone();
        match prev {
            Some(prev) if !seen.insert(prev.handle()) => return Err(corrupt(&prev)),
            Some(prev) => head = prev,
            None => break,
        }
    }

    let mut listed = HashSet::new();
    let mut tasks = Vec::with_capacity(seen.len());
    let mut current = Some(head);
    while let Some(task) = current {
        if !listed.insert(task.handle()) {
            return Err(corrupt(&task));
        }
        let next = task.read().next.clone();
        if let Some(next) = &next {
            let mirrored = next.read().prev.as_ref().is_some_and(|prev| prev.ptr_eq(&task));
            if !mirrored {
                return Err(corrupt(next));
            }
        }
        tasks.push(task);
        current = next;
    }

    if !listed.contains(&task.handle()) {
        return Err(corrupt(task));
    }
    Ok(tasks)
}

/// Clears the links of every task reachable from `task`.
fn sever(task: &Shared<Task>) {
    let mut seen = HashSet::new();
    let mut pending = vec![task.clone()];
    while let Some(task) = pending.pop() {
        if !seen.insert(task.handle()) {
            continue;
        }
        let mut links = task.write();
        pending.extend(links.prev.take());
        pending.extend(links.next.take());
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        self.clear();
    }
}
