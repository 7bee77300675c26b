//! TaskSet — the ordered collection of tasks sharing one capacity pool.
//!
//! Tasks are stored in a `Vec` whose order is the iteration order, with a
//! name → position index kept alongside. Priority sorting is stable, so
//! equal-priority tasks always keep their insertion order.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{DemandError, DemandResult};
use crate::task::Task;

#[derive(Debug)]
pub struct TaskSet {
    tasks: Vec<Task>,
    positions: HashMap<String, usize>,
    max_containers: i32,
}

impl TaskSet {
    /// Create an empty set with the given total capacity.
    pub fn new(max_containers: i32) -> Self {
        Self {
            tasks: Vec::new(),
            positions: HashMap::new(),
            max_containers,
        }
    }

    /// Build a set from tasks, rejecting duplicate names and bad bounds.
    pub fn from_tasks(max_containers: i32, tasks: impl IntoIterator<Item = Task>) -> DemandResult<Self> {
        let mut set = Self::new(max_containers);
        for task in tasks {
            set.insert(task)?;
        }
        Ok(set)
    }

    /// Add a task at the end of the current order.
    pub fn insert(&mut self, task: Task) -> DemandResult<()> {
        if self.positions.contains_key(&task.name) {
            return Err(DemandError::DuplicateTask(task.name));
        }
        if task.min_containers < 0 || task.min_containers > task.max_containers {
            return Err(DemandError::InvalidBounds {
                name: task.name,
                min: task.min_containers,
                max: task.max_containers,
            });
        }
        self.positions.insert(task.name.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Total container capacity.
    pub fn max_containers(&self) -> i32 {
        self.max_containers
    }

    /// Unallocated capacity: `max_containers − Σ demand`.
    pub fn check_capacity(&self) -> i32 {
        let committed: i32 = self.tasks.iter().map(|t| t.demand).sum();
        self.max_containers - committed
    }

    /// Re-order by priority, ascending (descending if `reverse`). Stable.
    pub fn priority_sort(&mut self, reverse: bool) {
        if reverse {
            self.tasks.sort_by(|a, b| b.priority.cmp(&a.priority));
        } else {
            self.tasks.sort_by(|a, b| a.priority.cmp(&b.priority));
        }
        self.reindex();
        debug!(
            reverse,
            order = ?self.tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "tasks sorted by priority"
        );
    }

    fn reindex(&mut self) {
        for (i, task) in self.tasks.iter().enumerate() {
            if let Some(pos) = self.positions.get_mut(&task.name) {
                *pos = i;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.positions.get(name).map(|&i| &self.tasks[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Task> {
        let i = *self.positions.get(name)?;
        self.tasks.get_mut(i)
    }

    /// Tasks in the current order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Tasks in the current order, mutably. The order itself cannot change.
    pub fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Task> {
        self.tasks.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Sum of `running` over all tasks.
    pub fn total_running(&self) -> i32 {
        self.tasks.iter().map(|t| t.running).sum()
    }
}

impl<'a> IntoIterator for &'a TaskSet {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &'a mut TaskSet {
    type Item = &'a mut Task;
    type IntoIter = std::slice::IterMut<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
