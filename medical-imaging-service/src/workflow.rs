use graph_flow::{Context, Graph, GraphBuilder, GraphError};
use std::sync::Arc;
use tracing::{info, warn};

use crate::fallback::fallback_output;
use crate::inference::InferenceBackend;
use crate::models::{ClinicalHistory, InferenceOutput};
use crate::tasks::{
    ExplanationTask, FindingsTask, RecommendationsTask, context_keys,
    explanation::EXPLANATION_TASK_ID, findings::FINDINGS_TASK_ID,
    recommendations::RECOMMENDATIONS_TASK_ID,
};

/// findings -> explanation -> recommendations
pub fn build_inference_workflow(backend: Arc<dyn InferenceBackend>) -> Graph {
    GraphBuilder::new("medical_image_inference")
        .add_task(Arc::new(FindingsTask::new(backend.clone())))
        .add_task(Arc::new(ExplanationTask::new(backend.clone())))
        .add_task(Arc::new(RecommendationsTask::new(backend)))
        .add_edge(FINDINGS_TASK_ID, EXPLANATION_TASK_ID)
        .add_edge(EXPLANATION_TASK_ID, RECOMMENDATIONS_TASK_ID)
        .build()
}

/// Live inference did not produce a complete report.
#[derive(Debug, Clone, PartialEq)]
pub struct NeedsFallback {
    /// Task that failed, or `"workflow"` when the failure was outside a task
    pub stage: String,
    pub reason: String,
}

impl From<GraphError> for NeedsFallback {
    fn from(error: GraphError) -> Self {
        Self {
            stage: error.failed_task().unwrap_or("workflow").to_string(),
            reason: error.root_message(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    Live,
    Fallback,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Live => "live",
            AnalysisMode::Fallback => "fallback",
        }
    }
}

/// The report a request will answer with, plus how it was obtained.
#[derive(Debug, Clone)]
pub struct ResolvedReport {
    pub output: InferenceOutput,
    pub mode: AnalysisMode,
}

/// Run the three stages. Any failing stage aborts the run and no partial
/// output is returned.
pub async fn run_inference(
    graph: &Graph,
    image_base64: &str,
    history: Option<&ClinicalHistory>,
) -> Result<InferenceOutput, NeedsFallback> {
    let context = Context::new();
    context.set(context_keys::IMAGE_BASE64, image_base64).await?;
    if let Some(history) = history {
        context.set(context_keys::CLINICAL_HISTORY, history).await?;
    }

    let result = graph.execute(context.clone()).await?;
    info!(
        stages = ?result.visited,
        status = ?result.status_message,
        "Inference workflow completed"
    );

    Ok(InferenceOutput {
        analysis: context.require(context_keys::ANALYSIS).await?,
        explanation: context.require(context_keys::EXPLANATION).await?,
        recommendations: context.require(context_keys::RECOMMENDATIONS).await?,
    })
}

/// Decide what to answer with: the live output, or the canned report.
pub fn resolve_report(outcome: Result<InferenceOutput, NeedsFallback>) -> ResolvedReport {
    match outcome {
        Ok(output) => ResolvedReport {
            output,
            mode: AnalysisMode::Live,
        },
        Err(needs_fallback) => {
            warn!(
                stage = %needs_fallback.stage,
                reason = %needs_fallback.reason,
                "Using fallback report due to inference failure"
            );
            ResolvedReport {
                output: fallback_output(),
                mode: AnalysisMode::Fallback,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::stub::{
        StubBackend, live_analysis, live_explanation, live_recommendations,
    };

    async fn run_with(backend: Arc<StubBackend>) -> Result<InferenceOutput, NeedsFallback> {
        let graph = build_inference_workflow(backend);
        run_inference(&graph, "aW1hZ2U=", None).await
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let backend = Arc::new(StubBackend::default());
        let output = run_with(backend.clone()).await.unwrap();

        assert_eq!(output.analysis, live_analysis());
        assert_eq!(output.explanation, live_explanation());
        assert_eq!(output.recommendations, live_recommendations());
        assert_eq!(
            backend.calls(),
            vec!["findings", "explanation", "recommendations"]
        );
    }

    #[tokio::test]
    async fn test_failure_at_each_stage_stops_the_sequence() {
        let cases = [
            ("findings", vec!["findings"]),
            ("explanation", vec!["findings", "explanation"]),
            (
                "recommendations",
                vec!["findings", "explanation", "recommendations"],
            ),
        ];

        for (stage, expected_calls) in cases {
            let backend = Arc::new(StubBackend::failing_at(stage));
            let needs_fallback = run_with(backend.clone()).await.unwrap_err();

            assert_eq!(needs_fallback.stage, stage);
            assert!(needs_fallback.reason.contains("503"), "{needs_fallback:?}");
            assert_eq!(backend.calls(), expected_calls);
        }
    }

    #[tokio::test]
    async fn test_resolve_report_picks_the_canned_report_on_failure() {
        let resolved = resolve_report(Err(NeedsFallback {
            stage: "explanation".into(),
            reason: "timeout".into(),
        }));
        assert_eq!(resolved.mode, AnalysisMode::Fallback);
        assert_eq!(resolved.output, fallback_output());

        let live = resolve_report(run_with(Arc::new(StubBackend::default())).await);
        assert_eq!(live.mode, AnalysisMode::Live);
        assert_eq!(live.output.analysis, live_analysis());
    }
}
