use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("graph has no start task")]
    NoStartTask,

    #[error("context error: {0}")]
    ContextError(String),

    #[error("task execution failed: {0}")]
    TaskExecutionFailed(String),

    /// A task inside a graph run failed; carries the id of the failing task.
    #[error("task '{task_id}' failed: {source}")]
    TaskFailed {
        task_id: String,
        #[source]
        source: Box<GraphError>,
    },
}

impl GraphError {
    /// Id of the task that failed, when the error came out of a graph run.
    pub fn failed_task(&self) -> Option<&str> {
        match self {
            GraphError::TaskFailed { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// The innermost error message, without the task wrapper.
    pub fn root_message(&self) -> String {
        match self {
            GraphError::TaskFailed { source, .. } => source.root_message(),
            GraphError::TaskExecutionFailed(msg) | GraphError::ContextError(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
