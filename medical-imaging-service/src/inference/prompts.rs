use crate::models::{AnalysisResult, ClinicalHistory};

pub const FINDINGS_PREAMBLE: &str = "You are an expert radiologist AI assistant used for educational demonstrations.";
pub const EXPLANATION_PREAMBLE: &str = "You are a medical AI expert explaining image analysis methodology to medical students and professionals.";
pub const RECOMMENDATIONS_PREAMBLE: &str = "You are a medical AI assistant suggesting educational follow-up care and documentation.";

const NOT_SPECIFIED: &str = "Not specified";

fn clinical_context_block(history: Option<&ClinicalHistory>) -> String {
    let Some(history) = history else {
        return String::new();
    };
    let age = history
        .patient_age
        .map(|a| a.to_string())
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());
    format!(
        "Clinical Context:\n- Patient Age: {}\n- Gender: {}\n- Chief Complaint: {}\n- Medical History: {}\n",
        age,
        history
            .patient_gender
            .map(|g| g.as_str())
            .unwrap_or(NOT_SPECIFIED),
        history.chief_complaint.as_deref().unwrap_or(NOT_SPECIFIED),
        history.medical_history.as_deref().unwrap_or(NOT_SPECIFIED),
    )
}

pub fn findings_prompt(history: Option<&ClinicalHistory>) -> String {
    format!(
        r#"{FINDINGS_PREAMBLE} Analyze this medical image and report your findings as JSON.

{context}
Respond with a JSON object of this shape:
{{
  "findings": [
    {{
      "type": "critical|warning|normal",
      "title": "Brief finding title",
      "description": "Detailed description with confidence percentage",
      "confidence": 0-100
    }}
  ],
  "overallConfidence": 0-100,
  "imageQuality": "Excellent|Good|Fair|Poor"
}}

Include 2-4 findings with varying severity levels. Respond with the JSON object only."#,
        context = clinical_context_block(history),
    )
}

pub fn explanation_prompt(analysis_json: &str, history_json: &str) -> String {
    format!(
        r#"Provide an educational explanation of the methodology behind this medical image analysis.

Analysis Results: {analysis_json}
Clinical History: {history_json}

Respond with a JSON object only:
{{
  "methodology": "Explanation of AI analysis approach and models used",
  "pipeline": "Description of image processing steps and feature extraction",
  "clinicalContext": "How clinical history influenced the analysis",
  "limitations": "Important limitations and uncertainties of the AI analysis"
}}"#
    )
}

pub fn recommendations_prompt(analysis_json: &str, history_json: &str) -> String {
    format!(
        r#"Based on this medical image analysis, provide educational recommendations for follow-up care and documentation.

Analysis Results: {analysis_json}
Clinical History: {history_json}

Respond with a JSON object only:
{{
  "immediate": ["Immediate actions to consider"],
  "followup": ["Follow-up recommendations"],
  "documentation": ["Documentation suggestions"]
}}

Provide 2-4 items in each category."#
    )
}

/// JSON for prompt embedding; an absent history renders as `{}`.
pub fn prompt_json(
    analysis: &AnalysisResult,
    history: Option<&ClinicalHistory>,
) -> serde_json::Result<(String, String)> {
    let analysis_json = serde_json::to_string(analysis)?;
    let history_json = match history {
        Some(history) => serde_json::to_string(history)?,
        None => "{}".to_string(),
    };
    Ok((analysis_json, history_json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;

    #[test]
    fn test_findings_prompt_marks_missing_fields() {
        let history = ClinicalHistory {
            patient_age: Some(60),
            patient_gender: Some(Gender::Female),
            ..Default::default()
        };
        let prompt = findings_prompt(Some(&history));
        assert!(prompt.contains("- Patient Age: 60"));
        assert!(prompt.contains("- Gender: female"));
        assert!(prompt.contains("- Chief Complaint: Not specified"));
    }

    #[test]
    fn test_findings_prompt_without_history_has_no_context_block() {
        assert!(!findings_prompt(None).contains("Clinical Context"));
    }
}
