use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional patient context supplied alongside an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalHistory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageQuality {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
}

impl ImageQuality {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Excellent" => Some(ImageQuality::Excellent),
            "Good" => Some(ImageQuality::Good),
            "Fair" => Some(ImageQuality::Fair),
            "Poor" => Some(ImageQuality::Poor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub findings: Vec<Finding>,
    pub overall_confidence: u8,
    pub image_quality: ImageQuality,
    /// Seconds, one decimal place
    pub processing_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Explanation {
    pub methodology: String,
    pub pipeline: String,
    pub clinical_context: String,
    pub limitations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendations {
    pub immediate: Vec<String>,
    pub followup: Vec<String>,
    pub documentation: Vec<String>,
}

/// Everything an analysis produces: live from the model or the canned fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    pub analysis: AnalysisResult,
    pub explanation: Explanation,
    pub recommendations: Recommendations,
}

/// Fields handed to the store; id and timestamp are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewAnalysisRecord {
    pub image_filename: String,
    pub image_base64: String,
    pub patient_age: Option<i64>,
    pub patient_gender: Option<Gender>,
    pub chief_complaint: Option<String>,
    pub medical_history: Option<String>,
    pub analysis_results: AnalysisResult,
    /// Serialized [`Explanation`] JSON
    pub ai_explanation: String,
    pub recommendations: Recommendations,
    pub confidence: u8,
    /// Milliseconds
    pub processing_time: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalAnalysisRecord {
    pub id: i64,
    pub image_filename: String,
    pub image_base64: String,
    pub patient_age: Option<i64>,
    pub patient_gender: Option<Gender>,
    pub chief_complaint: Option<String>,
    pub medical_history: Option<String>,
    pub analysis_results: AnalysisResult,
    pub ai_explanation: String,
    pub recommendations: Recommendations,
    pub confidence: u8,
    pub processing_time: i64,
    pub created_at: DateTime<Utc>,
}

impl MedicalAnalysisRecord {
    pub fn from_new(id: i64, new: NewAnalysisRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            image_filename: new.image_filename,
            image_base64: new.image_base64,
            patient_age: new.patient_age,
            patient_gender: new.patient_gender,
            chief_complaint: new.chief_complaint,
            medical_history: new.medical_history,
            analysis_results: new.analysis_results,
            ai_explanation: new.ai_explanation,
            recommendations: new.recommendations,
            confidence: new.confidence,
            processing_time: new.processing_time,
            created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub id: i64,
    pub analysis: AnalysisResult,
    pub explanation: Explanation,
    pub recommendations: Recommendations,
    pub image_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalHistoryView {
    pub patient_age: Option<i64>,
    pub patient_gender: Option<Gender>,
    pub chief_complaint: Option<String>,
    pub medical_history: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetailResponse {
    pub id: i64,
    pub analysis: AnalysisResult,
    pub explanation: Explanation,
    pub recommendations: Recommendations,
    pub image_url: String,
    pub clinical_history: ClinicalHistoryView,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub id: i64,
    pub filename: String,
    pub confidence: u8,
    pub created_at: DateTime<Utc>,
    pub patient_age: Option<i64>,
    pub chief_complaint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}
