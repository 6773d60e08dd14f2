pub mod explanation;
pub mod findings;
pub mod recommendations;

pub use explanation::ExplanationTask;
pub use findings::FindingsTask;
pub use recommendations::RecommendationsTask;

use graph_flow::GraphError;

use crate::inference::InferenceError;

/// Keys shared between the inference tasks through the graph context
pub mod context_keys {
    pub const IMAGE_BASE64: &str = "image_base64";
    pub const CLINICAL_HISTORY: &str = "clinical_history";
    pub const ANALYSIS: &str = "analysis";
    pub const EXPLANATION: &str = "explanation";
    pub const RECOMMENDATIONS: &str = "recommendations";
}

fn stage_failed(error: InferenceError) -> GraphError {
    GraphError::TaskExecutionFailed(error.to_string())
}
