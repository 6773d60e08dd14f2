use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, Task, TaskResult};
use std::sync::Arc;
use tracing::info;

use super::{context_keys, stage_failed};
use crate::inference::InferenceBackend;
use crate::models::{AnalysisResult, ClinicalHistory};

pub const FINDINGS_TASK_ID: &str = "findings";

/// Vision call over the uploaded image.
pub struct FindingsTask {
    backend: Arc<dyn InferenceBackend>,
}

impl FindingsTask {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Task for FindingsTask {
    fn id(&self) -> &str {
        FINDINGS_TASK_ID
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!("Starting image findings analysis");

        let image_base64: String = context.require(context_keys::IMAGE_BASE64).await?;
        let history: Option<ClinicalHistory> = context.get(context_keys::CLINICAL_HISTORY).await;

        let analysis: AnalysisResult = self
            .backend
            .analyze_image(&image_base64, history.as_ref())
            .await
            .map_err(stage_failed)?;

        let status = format!(
            "{} findings at {}% overall confidence",
            analysis.findings.len(),
            analysis.overall_confidence
        );
        context.set(context_keys::ANALYSIS, &analysis).await?;

        Ok(TaskResult::new_with_status(NextAction::Continue, Some(status)))
    }
}
