//! Client side of the external multimodal model.
//!
//! Three independent calls produce the findings, the explanation and the
//! recommendations. Responses are parsed leniently: missing fields get
//! defaults, anything that is not a JSON object is an error.

mod openrouter;
mod prompts;

pub use openrouter::OpenRouterBackend;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    AnalysisResult, ClinicalHistory, Explanation, Finding, ImageQuality, Recommendations, Severity,
};

pub const DEFAULT_OVERALL_CONFIDENCE: u8 = 85;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("OPENROUTER_API_KEY is not configured")]
    NotConfigured,

    #[error("request to inference API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("inference API returned no message")]
    EmptyResponse,

    #[error("could not parse model response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("agent call failed: {0}")]
    Agent(String),
}

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Vision call producing findings for the image.
    async fn analyze_image(
        &self,
        image_base64: &str,
        history: Option<&ClinicalHistory>,
    ) -> Result<AnalysisResult, InferenceError>;

    async fn explain(
        &self,
        analysis: &AnalysisResult,
        history: Option<&ClinicalHistory>,
    ) -> Result<Explanation, InferenceError>;

    async fn recommend(
        &self,
        analysis: &AnalysisResult,
        history: Option<&ClinicalHistory>,
    ) -> Result<Recommendations, InferenceError>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAnalysis {
    findings: Vec<RawFinding>,
    overall_confidence: Option<f64>,
    image_quality: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFinding {
    #[serde(rename = "type")]
    kind: Option<String>,
    title: String,
    description: String,
    confidence: Option<f64>,
}

/// Remove a surrounding markdown code fence, if the model added one.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_prefix
        .strip_suffix("```")
        .unwrap_or(without_prefix)
        .trim()
}

fn parse_object(raw: &str) -> Result<Value, InferenceError> {
    let cleaned = strip_code_fences(raw);
    if cleaned.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    Ok(serde_json::from_str(cleaned)?)
}

fn to_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Parse the findings response. `processing_time` is measured by the caller.
pub fn parse_analysis(raw: &str, processing_time: f64) -> Result<AnalysisResult, InferenceError> {
    let parsed: RawAnalysis = serde_json::from_value(parse_object(raw)?)?;

    let findings = parsed
        .findings
        .into_iter()
        .map(|f| Finding {
            severity: match f.kind.as_deref() {
                Some("critical") => Severity::Critical,
                Some("warning") => Severity::Warning,
                _ => Severity::Normal,
            },
            title: f.title,
            description: f.description,
            confidence: f.confidence.map(to_percent).unwrap_or(0),
        })
        .collect();

    // zero counts as missing
    let overall_confidence = parsed
        .overall_confidence
        .filter(|c| *c > 0.0)
        .map(to_percent)
        .unwrap_or(DEFAULT_OVERALL_CONFIDENCE);

    let image_quality = parsed
        .image_quality
        .as_deref()
        .and_then(ImageQuality::parse)
        .unwrap_or_default();

    Ok(AnalysisResult {
        findings,
        overall_confidence,
        image_quality,
        processing_time: round_to_tenth(processing_time),
    })
}

pub fn parse_explanation(raw: &str) -> Result<Explanation, InferenceError> {
    Ok(serde_json::from_value(parse_object(raw)?)?)
}

pub fn parse_recommendations(raw: &str) -> Result<Recommendations, InferenceError> {
    Ok(serde_json::from_value(parse_object(raw)?)?)
}

pub fn round_to_tenth(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::sync::Mutex;

    /// Backend that answers from fixed data and can fail at a chosen stage.
    #[derive(Default)]
    pub(crate) struct StubBackend {
        pub(crate) fail_at: Option<&'static str>,
        pub(crate) calls: Mutex<Vec<&'static str>>,
    }

    impl StubBackend {
        pub(crate) fn failing_at(stage: &'static str) -> Self {
            Self {
                fail_at: Some(stage),
                ..Default::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, stage: &'static str) -> Result<(), InferenceError> {
            self.calls.lock().unwrap().push(stage);
            if self.fail_at == Some(stage) {
                return Err(InferenceError::Status {
                    status: 503,
                    body: format!("{stage} unavailable"),
                });
            }
            Ok(())
        }
    }

    pub(crate) fn live_analysis() -> AnalysisResult {
        AnalysisResult {
            findings: vec![
                Finding {
                    severity: Severity::Critical,
                    title: "Right Lower Lobe Opacity".into(),
                    description: "Focal opacity suggesting consolidation.".into(),
                    confidence: 81,
                },
                Finding {
                    severity: Severity::Normal,
                    title: "Normal Mediastinum".into(),
                    description: "Mediastinal contours within normal limits.".into(),
                    confidence: 90,
                },
            ],
            overall_confidence: 79,
            image_quality: ImageQuality::Fair,
            processing_time: 1.4,
        }
    }

    pub(crate) fn live_explanation() -> Explanation {
        Explanation {
            methodology: "Stub methodology".into(),
            pipeline: "Stub pipeline".into(),
            clinical_context: "Stub context".into(),
            limitations: "Stub limitations".into(),
        }
    }

    pub(crate) fn live_recommendations() -> Recommendations {
        Recommendations {
            immediate: vec!["Repeat imaging".into(), "Check vitals".into()],
            followup: vec!["Clinic review".into(), "Repeat film".into()],
            documentation: vec!["Record findings".into(), "Note symptoms".into()],
        }
    }

    #[async_trait]
    impl InferenceBackend for StubBackend {
        async fn analyze_image(
            &self,
            _image_base64: &str,
            _history: Option<&ClinicalHistory>,
        ) -> Result<AnalysisResult, InferenceError> {
            self.record("findings")?;
            Ok(live_analysis())
        }

        async fn explain(
            &self,
            _analysis: &AnalysisResult,
            _history: Option<&ClinicalHistory>,
        ) -> Result<Explanation, InferenceError> {
            self.record("explanation")?;
            Ok(live_explanation())
        }

        async fn recommend(
            &self,
            _analysis: &AnalysisResult,
            _history: Option<&ClinicalHistory>,
        ) -> Result<Recommendations, InferenceError> {
            self.record("recommendations")?;
            Ok(live_recommendations())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_applies_defaults() {
        let analysis = parse_analysis("{}", 1.26).unwrap();
        assert!(analysis.findings.is_empty());
        assert_eq!(analysis.overall_confidence, 85);
        assert_eq!(analysis.image_quality, ImageQuality::Good);
        assert_eq!(analysis.processing_time, 1.3);
    }

    #[test]
    fn test_parse_analysis_reads_findings() {
        let raw = r#"```json
        {
            "findings": [
                {"type": "critical", "title": "Pneumothorax", "description": "Left apical", "confidence": 91.6},
                {"type": "warning", "title": "Effusion", "description": "Small", "confidence": 140},
                {"type": "odd", "title": "Other", "description": "n/a"}
            ],
            "overallConfidence": 77,
            "imageQuality": "Poor"
        }
        ```"#;
        let analysis = parse_analysis(raw, 0.0).unwrap();

        assert_eq!(analysis.findings.len(), 3);
        assert_eq!(analysis.findings[0].severity, Severity::Critical);
        assert_eq!(analysis.findings[0].confidence, 92);
        assert_eq!(analysis.findings[1].severity, Severity::Warning);
        assert_eq!(analysis.findings[1].confidence, 100);
        assert_eq!(analysis.findings[2].severity, Severity::Normal);
        assert_eq!(analysis.findings[2].confidence, 0);
        assert_eq!(analysis.overall_confidence, 77);
        assert_eq!(analysis.image_quality, ImageQuality::Poor);
    }

    #[test]
    fn test_zero_or_unknown_values_fall_back_to_defaults() {
        let analysis =
            parse_analysis(r#"{"overallConfidence": 0, "imageQuality": "Blurry"}"#, 0.0).unwrap();
        assert_eq!(analysis.overall_confidence, 85);
        assert_eq!(analysis.image_quality, ImageQuality::Good);
    }

    #[test]
    fn test_malformed_responses_are_errors() {
        assert!(matches!(
            parse_analysis("I cannot analyze this image.", 0.0),
            Err(InferenceError::InvalidJson(_))
        ));
        assert!(parse_recommendations(r#"{"immediate": "not a list"}"#).is_err());
    }

    #[test]
    fn test_partial_explanation_and_recommendations() {
        let explanation = parse_explanation(r#"{"methodology": "CNN"}"#).unwrap();
        assert_eq!(explanation.methodology, "CNN");
        assert!(explanation.limitations.is_empty());

        let recommendations = parse_recommendations(r#"{"followup": ["a", "b"]}"#).unwrap();
        assert_eq!(recommendations.followup, vec!["a", "b"]);
        assert!(recommendations.immediate.is_empty());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }
}
