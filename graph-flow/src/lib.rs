pub mod context;
pub mod error;
pub mod graph;
pub mod task;

// Re-export commonly used types
pub use context::Context;
pub use error::{GraphError, Result};
pub use graph::{ExecutionResult, Graph, GraphBuilder};
pub use task::{NextAction, Task, TaskResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AppendTask {
        id: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Task for AppendTask {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut trail: Vec<String> = context.get("trail").await.unwrap_or_default();
            trail.push(self.id.clone());
            context.set("trail", trail).await?;
            Ok(TaskResult::new_with_status(
                NextAction::Continue,
                Some(format!("{} done", self.id)),
            ))
        }
    }

    struct FailingTask;

    #[async_trait]
    impl Task for FailingTask {
        fn id(&self) -> &str {
            "broken"
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Err(GraphError::TaskExecutionFailed("upstream unavailable".into()))
        }
    }

    fn append(id: &str, calls: &Arc<AtomicUsize>) -> Arc<AppendTask> {
        Arc::new(AppendTask {
            id: id.to_string(),
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn test_linear_graph_runs_in_edge_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = GraphBuilder::new("linear")
            .add_task(append("a", &calls))
            .add_task(append("b", &calls))
            .add_task(append("c", &calls))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .build();

        let context = Context::new();
        let result = graph.execute(context.clone()).await.unwrap();

        assert_eq!(result.visited, vec!["a", "b", "c"]);
        assert_eq!(result.status_message.as_deref(), Some("c done"));
        let trail: Vec<String> = context.get("trail").await.unwrap();
        assert_eq!(trail, vec!["a", "b", "c"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = GraphBuilder::new("fail_fast")
            .add_task(append("a", &calls))
            .add_task(Arc::new(FailingTask))
            .add_task(append("c", &calls))
            .add_edge("a", "broken")
            .add_edge("broken", "c")
            .build();

        let err = graph.execute(Context::new()).await.unwrap_err();

        assert_eq!(err.failed_task(), Some("broken"));
        assert_eq!(err.root_message(), "upstream unavailable");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct JumpTask {
        id: &'static str,
        target: &'static str,
    }

    #[async_trait]
    impl Task for JumpTask {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Ok(TaskResult::new(NextAction::GoTo(self.target.to_string())))
        }
    }

    struct StopTask;

    #[async_trait]
    impl Task for StopTask {
        fn id(&self) -> &str {
            "stop"
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Ok(TaskResult::new(NextAction::End))
        }
    }

    #[tokio::test]
    async fn test_goto_skips_edges_and_end_stops() {
        let calls = Arc::new(AtomicUsize::new(0));
        let graph = GraphBuilder::new("jumps")
            .add_task(append("a", &calls))
            .add_task(Arc::new(JumpTask {
                id: "jump",
                target: "stop",
            }))
            .add_task(Arc::new(StopTask))
            .add_edge("jump", "a")
            .add_edge("stop", "a")
            .set_start_task("jump")
            .build();

        assert_eq!(graph.start_task_id(), Some("jump"));
        let result = graph.execute(Context::new()).await.unwrap();

        assert_eq!(result.visited, vec!["jump", "stop"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_goto_unknown_task_is_an_error() {
        let graph = GraphBuilder::new("dangling")
            .add_task(Arc::new(JumpTask {
                id: "jump",
                target: "nowhere",
            }))
            .set_start_task("missing")
            .build();

        assert_eq!(graph.start_task_id(), Some("jump"));
        let err = graph.execute(Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskNotFound(ref id) if id == "nowhere"));
    }

    #[tokio::test]
    async fn test_empty_graph_has_no_start_task() {
        let graph = GraphBuilder::new("empty").build();
        let err = graph.execute(Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::NoStartTask));
    }

    #[tokio::test]
    async fn test_context_require_reports_missing_key() {
        let context = Context::new();
        context.set("present", 7u32).await.unwrap();

        let present: u32 = context.require("present").await.unwrap();
        assert_eq!(present, 7);

        let missing = context.require::<u32>("absent").await.unwrap_err();
        assert!(matches!(missing, GraphError::ContextError(_)));
    }
}
