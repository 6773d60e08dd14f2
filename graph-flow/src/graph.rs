use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    context::Context,
    error::{GraphError, Result},
    task::{NextAction, Task},
};

/// Edge between tasks in the graph
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// A graph of tasks that can be executed
pub struct Graph {
    pub id: String,
    tasks: DashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
}

impl Graph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: DashMap::new(),
            edges: Vec::new(),
            start_task_id: None,
        }
    }

    /// Run the graph from its start task until a task ends it or no outgoing
    /// edge remains. The first failing task stops the run; its error is
    /// wrapped in [`GraphError::TaskFailed`] with the task id.
    pub async fn execute(&self, context: Context) -> Result<ExecutionResult> {
        let mut current = self.start_task_id.clone().ok_or(GraphError::NoStartTask)?;
        let mut visited = Vec::new();
        let mut status_message = None;

        loop {
            let task = self
                .get_task(&current)
                .ok_or_else(|| GraphError::TaskNotFound(current.clone()))?;

            debug!(graph_id = %self.id, task_id = %current, "Running task");

            let mut result = task.run(context.clone()).await.map_err(|e| {
                warn!(graph_id = %self.id, task_id = %current, error = %e, "Task failed");
                GraphError::TaskFailed {
                    task_id: current.clone(),
                    source: Box::new(e),
                }
            })?;
            result.task_id = current.clone();
            visited.push(current.clone());
            if result.status_message.is_some() {
                status_message = result.status_message.take();
            }

            let next = match result.next_action {
                NextAction::Continue => self.find_next_task(&current),
                NextAction::GoTo(target_id) => {
                    if !self.tasks.contains_key(&target_id) {
                        return Err(GraphError::TaskNotFound(target_id));
                    }
                    Some(target_id)
                }
                NextAction::End => None,
            };

            match next {
                Some(next_task_id) => current = next_task_id,
                None => break,
            }
        }

        Ok(ExecutionResult {
            visited,
            status_message,
        })
    }

    /// Find the next task following the first outgoing edge
    pub fn find_next_task(&self, current_task_id: &str) -> Option<String> {
        self.edges
            .iter()
            .find(|edge| edge.from == current_task_id)
            .map(|edge| edge.to.clone())
    }

    /// Get the start task ID
    pub fn start_task_id(&self) -> Option<&str> {
        self.start_task_id.as_deref()
    }

    /// Get a task by ID
    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_id).map(|entry| entry.clone())
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(id),
        }
    }

    /// Add a task; the first task added becomes the start task.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.graph.tasks.is_empty() {
            self.graph.start_task_id = Some(task_id.clone());
        }
        self.graph.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.graph.edges.push(Edge {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if self.graph.tasks.contains_key(&task_id) {
            self.graph.start_task_id = Some(task_id);
        }
        self
    }

    pub fn build(self) -> Graph {
        self.graph
    }
}

/// Outcome of a completed graph run
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Task ids in the order they ran
    pub visited: Vec<String>,
    /// Last status message reported by a task
    pub status_message: Option<String>,
}
