//! Builds response payloads and store records. Pure transformations.

use tracing::warn;

use crate::models::{
    AnalysisDetailResponse, AnalysisSummary, AnalyzeResponse, ClinicalHistory,
    ClinicalHistoryView, Explanation, InferenceOutput, MedicalAnalysisRecord, NewAnalysisRecord,
};

pub fn image_data_url(image_base64: &str) -> String {
    format!("data:image/jpeg;base64,{}", image_base64)
}

pub fn new_record(
    image_filename: String,
    image_base64: String,
    history: Option<&ClinicalHistory>,
    output: &InferenceOutput,
) -> serde_json::Result<NewAnalysisRecord> {
    let history = history.cloned().unwrap_or_default();
    Ok(NewAnalysisRecord {
        image_filename,
        image_base64,
        patient_age: history.patient_age,
        patient_gender: history.patient_gender,
        chief_complaint: history.chief_complaint,
        medical_history: history.medical_history,
        analysis_results: output.analysis.clone(),
        ai_explanation: serde_json::to_string(&output.explanation)?,
        recommendations: output.recommendations.clone(),
        confidence: output.analysis.overall_confidence,
        processing_time: (output.analysis.processing_time * 1000.0).round() as i64,
    })
}

pub fn analyze_response(record: &MedicalAnalysisRecord, output: InferenceOutput) -> AnalyzeResponse {
    AnalyzeResponse {
        id: record.id,
        analysis: output.analysis,
        explanation: output.explanation,
        recommendations: output.recommendations,
        image_url: image_data_url(&record.image_base64),
    }
}

fn stored_explanation(record: &MedicalAnalysisRecord) -> Explanation {
    serde_json::from_str(&record.ai_explanation).unwrap_or_else(|e| {
        warn!(analysis_id = record.id, error = %e, "Stored explanation is not valid JSON");
        Explanation::default()
    })
}

pub fn detail_response(record: MedicalAnalysisRecord) -> AnalysisDetailResponse {
    let explanation = stored_explanation(&record);
    AnalysisDetailResponse {
        id: record.id,
        analysis: record.analysis_results,
        explanation,
        recommendations: record.recommendations,
        image_url: image_data_url(&record.image_base64),
        clinical_history: ClinicalHistoryView {
            patient_age: record.patient_age,
            patient_gender: record.patient_gender,
            chief_complaint: record.chief_complaint,
            medical_history: record.medical_history,
        },
        created_at: record.created_at,
    }
}

pub fn summary(record: &MedicalAnalysisRecord) -> AnalysisSummary {
    AnalysisSummary {
        id: record.id,
        filename: record.image_filename.clone(),
        confidence: record.confidence,
        created_at: record.created_at,
        patient_age: record.patient_age,
        chief_complaint: record.chief_complaint.clone(),
    }
}
