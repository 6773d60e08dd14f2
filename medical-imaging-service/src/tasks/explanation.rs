use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::info;

use super::{context_keys, stage_failed};
use crate::inference::InferenceBackend;
use crate::models::{AnalysisResult, ClinicalHistory};

pub const EXPLANATION_TASK_ID: &str = "explanation";

pub struct ExplanationTask {
    backend: Arc<dyn InferenceBackend>,
}

impl ExplanationTask {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Task for ExplanationTask {
    fn id(&self) -> &str {
        EXPLANATION_TASK_ID
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!("Generating analysis explanation");

        let analysis: AnalysisResult = context.require(context_keys::ANALYSIS).await?;
        let history: Option<ClinicalHistory> = context.get(context_keys::CLINICAL_HISTORY).await;

        let explanation = self
            .backend
            .explain(&analysis, history.as_ref())
            .await
            .map_err(stage_failed)?;
        context.set(context_keys::EXPLANATION, &explanation).await?;

        Ok(TaskResult::new_with_status(
            NextAction::Continue,
            Some("Explanation generated".to_string()),
        ))
    }
}
