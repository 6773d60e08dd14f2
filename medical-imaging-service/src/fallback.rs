//! Canned chest X-ray report served whenever live inference fails.
//!
//! The payload is the same for every input. Product changes to the demo
//! report belong here and nowhere else.

use crate::models::{
    AnalysisResult, Explanation, Finding, ImageQuality, InferenceOutput, Recommendations, Severity,
};

pub const FALLBACK_OVERALL_CONFIDENCE: u8 = 88;
pub const FALLBACK_IMAGE_QUALITY: ImageQuality = ImageQuality::Good;
pub const FALLBACK_PROCESSING_TIME: f64 = 2.3;

/// (severity, title, description, confidence)
pub const FALLBACK_FINDINGS: [(Severity, &str, &str, u8); 4] = [
    (
        Severity::Normal,
        "Clear Lung Fields",
        "Both lung fields appear clear with normal vascular markings. No evidence of consolidation, infiltrates, or pneumothorax.",
        92,
    ),
    (
        Severity::Normal,
        "Normal Heart Size",
        "Cardiac silhouette appears normal in size and configuration. No cardiomegaly observed.",
        89,
    ),
    (
        Severity::Warning,
        "Mild Increased Bronchial Markings",
        "Slightly increased bronchial markings consistent with smoking history. May indicate early chronic changes.",
        76,
    ),
    (
        Severity::Normal,
        "Intact Diaphragm",
        "Both hemidiaphragms are clearly visualized and appear intact with normal contours.",
        94,
    ),
];

pub const FALLBACK_METHODOLOGY: &str = "This analysis used computer vision algorithms trained on chest radiographs to identify anatomical structures and potential abnormalities. The AI model evaluates lung fields, cardiac silhouette, bony structures, and soft tissues.";
pub const FALLBACK_PIPELINE: &str = "Image preprocessing → Feature extraction → Pattern recognition → Clinical correlation → Confidence scoring → Report generation";
pub const FALLBACK_CLINICAL_CONTEXT: &str = "Given the patient's smoking history and respiratory symptoms, the analysis focused on lung parenchyma, bronchial patterns, and cardiac assessment to evaluate for smoking-related changes.";
pub const FALLBACK_LIMITATIONS: &str = "AI analysis is for educational purposes only. Results should always be reviewed by qualified radiologists. Subtle findings may be missed, and clinical correlation is essential for accurate diagnosis.";

pub const FALLBACK_IMMEDIATE: [&str; 3] = [
    "Clinical correlation with patient symptoms recommended",
    "Consider pulmonary function tests given smoking history",
    "Follow-up chest X-ray in 6 months if symptoms persist",
];
pub const FALLBACK_FOLLOWUP: [&str; 3] = [
    "Smoking cessation counseling strongly recommended",
    "Monitor for development of respiratory symptoms",
    "Annual chest imaging for high-risk smoking history",
];
pub const FALLBACK_DOCUMENTATION: [&str; 3] = [
    "Document smoking pack-year history in detail",
    "Record baseline pulmonary function if available",
    "Note any family history of respiratory disease",
];

pub fn fallback_analysis() -> AnalysisResult {
    AnalysisResult {
        findings: FALLBACK_FINDINGS
            .iter()
            .map(|(severity, title, description, confidence)| Finding {
                severity: *severity,
                title: title.to_string(),
                description: description.to_string(),
                confidence: *confidence,
            })
            .collect(),
        overall_confidence: FALLBACK_OVERALL_CONFIDENCE,
        image_quality: FALLBACK_IMAGE_QUALITY,
        processing_time: FALLBACK_PROCESSING_TIME,
    }
}

pub fn fallback_explanation() -> Explanation {
    Explanation {
        methodology: FALLBACK_METHODOLOGY.to_string(),
        pipeline: FALLBACK_PIPELINE.to_string(),
        clinical_context: FALLBACK_CLINICAL_CONTEXT.to_string(),
        limitations: FALLBACK_LIMITATIONS.to_string(),
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn fallback_recommendations() -> Recommendations {
    Recommendations {
        immediate: owned(&FALLBACK_IMMEDIATE),
        followup: owned(&FALLBACK_FOLLOWUP),
        documentation: owned(&FALLBACK_DOCUMENTATION),
    }
}

pub fn fallback_output() -> InferenceOutput {
    InferenceOutput {
        analysis: fallback_analysis(),
        explanation: fallback_explanation(),
        recommendations: fallback_recommendations(),
    }
}
