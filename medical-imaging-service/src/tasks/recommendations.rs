use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::info;

use super::{context_keys, stage_failed};
use crate::inference::InferenceBackend;
use crate::models::{AnalysisResult, ClinicalHistory};

pub const RECOMMENDATIONS_TASK_ID: &str = "recommendations";

/// Last stage; ends the run.
pub struct RecommendationsTask {
    backend: Arc<dyn InferenceBackend>,
}

impl RecommendationsTask {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Task for RecommendationsTask {
    fn id(&self) -> &str {
        RECOMMENDATIONS_TASK_ID
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!("Generating recommendations");

        let analysis: AnalysisResult = context.require(context_keys::ANALYSIS).await?;
        let history: Option<ClinicalHistory> = context.get(context_keys::CLINICAL_HISTORY).await;

        let recommendations = self
            .backend
            .recommend(&analysis, history.as_ref())
            .await
            .map_err(stage_failed)?;
        let total = recommendations.immediate.len()
            + recommendations.followup.len()
            + recommendations.documentation.len();
        context
            .set(context_keys::RECOMMENDATIONS, &recommendations)
            .await?;

        Ok(TaskResult::new_with_status(
            NextAction::End,
            Some(format!("{total} recommendations generated")),
        ))
    }
}
