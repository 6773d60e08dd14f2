use async_trait::async_trait;
use reqwest::Client;
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, info};

use super::{
    InferenceBackend, InferenceError, parse_analysis, parse_explanation, parse_recommendations,
    prompts,
};
use crate::models::{AnalysisResult, ClinicalHistory, Explanation, Recommendations};

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const FINDINGS_MAX_TOKENS: u64 = 1000;
const EXPLANATION_MAX_TOKENS: u64 = 800;
const RECOMMENDATIONS_MAX_TOKENS: u64 = 600;

/// Production backend: the vision call goes straight to the chat-completions
/// endpoint, the two text calls go through rig agents.
pub struct OpenRouterBackend {
    client: Client,
    api_key: Option<String>,
    model: String,
}

impl OpenRouterBackend {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.into(),
        }
    }

    fn api_key(&self) -> Result<&str, InferenceError> {
        self.api_key.as_deref().ok_or(InferenceError::NotConfigured)
    }

    fn agent(
        &self,
        preamble: &str,
        max_tokens: u64,
    ) -> Result<Agent<openrouter::CompletionModel>, InferenceError> {
        let client = openrouter::Client::new(self.api_key()?);
        Ok(client
            .agent(&self.model)
            .preamble(preamble)
            .max_tokens(max_tokens)
            .build())
    }

    async fn prompt_agent(
        &self,
        preamble: &str,
        prompt: String,
        max_tokens: u64,
    ) -> Result<String, InferenceError> {
        let agent = self.agent(preamble, max_tokens)?;
        agent
            .prompt(&prompt)
            .await
            .map_err(|e| InferenceError::Agent(e.to_string()))
    }

    /// Chat-completions call with a text part and an inline image part.
    async fn call_vision(&self, prompt: String, image_base64: &str) -> Result<String, InferenceError> {
        let api_key = self.api_key()?;

        let payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": prompt },
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/jpeg;base64,{}", image_base64) }
                        }
                    ]
                }
            ],
            "response_format": { "type": "json_object" },
            "max_tokens": FINDINGS_MAX_TOKENS
        });

        let response = self
            .client
            .post(OPENROUTER_CHAT_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: Value = response.json().await?;
        message_content(&response_json)
    }
}

/// Text of the first choice. A message with no content reads as an empty
/// object so the parser fills in defaults; no message at all is an error.
fn message_content(response: &Value) -> Result<String, InferenceError> {
    let message = response["choices"][0]
        .get("message")
        .ok_or(InferenceError::EmptyResponse)?;
    let content = message["content"].as_str().unwrap_or_default();
    if content.is_empty() {
        return Ok("{}".to_string());
    }
    Ok(content.to_string())
}

#[async_trait]
impl InferenceBackend for OpenRouterBackend {
    async fn analyze_image(
        &self,
        image_base64: &str,
        history: Option<&ClinicalHistory>,
    ) -> Result<AnalysisResult, InferenceError> {
        let started = Instant::now();
        let raw = self
            .call_vision(prompts::findings_prompt(history), image_base64)
            .await?;
        let elapsed = started.elapsed().as_secs_f64();

        debug!(chars = raw.len(), "Received findings response");
        let analysis = parse_analysis(&raw, elapsed)?;
        info!(
            findings = analysis.findings.len(),
            overall_confidence = analysis.overall_confidence,
            processing_time = analysis.processing_time,
            "Image analysis completed"
        );
        Ok(analysis)
    }

    async fn explain(
        &self,
        analysis: &AnalysisResult,
        history: Option<&ClinicalHistory>,
    ) -> Result<Explanation, InferenceError> {
        let (analysis_json, history_json) = prompts::prompt_json(analysis, history)?;
        let raw = self
            .prompt_agent(
                prompts::EXPLANATION_PREAMBLE,
                prompts::explanation_prompt(&analysis_json, &history_json),
                EXPLANATION_MAX_TOKENS,
            )
            .await?;
        parse_explanation(&raw)
    }

    async fn recommend(
        &self,
        analysis: &AnalysisResult,
        history: Option<&ClinicalHistory>,
    ) -> Result<Recommendations, InferenceError> {
        let (analysis_json, history_json) = prompts::prompt_json(analysis, history)?;
        let raw = self
            .prompt_agent(
                prompts::RECOMMENDATIONS_PREAMBLE,
                prompts::recommendations_prompt(&analysis_json, &history_json),
                RECOMMENDATIONS_MAX_TOKENS,
            )
            .await?;
        parse_recommendations(&raw)
    }
}
