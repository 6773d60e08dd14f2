//! Upload, clinical history and contact form checks. Nothing here has side effects.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

use crate::models::{ClinicalHistory, ContactRequest};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];

const MAX_PATIENT_AGE: i64 = 150;
const MAX_CHIEF_COMPLAINT_CHARS: usize = 1000;
const MAX_MEDICAL_HISTORY_CHARS: usize = 2000;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

#[derive(Debug, Error, PartialEq)]
pub enum UploadError {
    #[error("No image file provided")]
    Missing,

    #[error("Invalid file type: {0}. Only JPEG, PNG, JPG, and WebP are allowed.")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum ClinicalHistoryError {
    #[error("clinical history is not valid JSON: {0}")]
    Malformed(String),

    #[error("patientAge must be between 0 and 150, got {0}")]
    AgeOutOfRange(i64),

    #[error("{field} must be at most {max} characters, got {actual}")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

pub fn validate_upload_type(content_type: Option<&str>) -> Result<(), UploadError> {
    match content_type {
        Some(mime) if ALLOWED_IMAGE_TYPES.contains(&mime) => Ok(()),
        Some(mime) => Err(UploadError::UnsupportedType(mime.to_string())),
        None => Err(UploadError::UnsupportedType("unknown".to_string())),
    }
}

pub fn validate_upload_size(size: usize) -> Result<(), UploadError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

pub fn validate_upload(content_type: Option<&str>, size: usize) -> Result<(), UploadError> {
    validate_upload_type(content_type)?;
    validate_upload_size(size)
}

const CLINICAL_HISTORY_FIELDS: [&str; 4] =
    ["patientAge", "patientGender", "chiefComplaint", "medicalHistory"];

pub fn parse_clinical_history(raw: &str) -> Result<ClinicalHistory, ClinicalHistoryError> {
    let malformed = |message: String| ClinicalHistoryError::Malformed(message);

    let value: Value = serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(malformed("expected a JSON object".to_string()));
    };
    for key in CLINICAL_HISTORY_FIELDS {
        if fields.get(key).is_some_and(Value::is_null) {
            return Err(malformed(format!("{key} must not be null")));
        }
    }
    normalize_whole_age(&mut fields);

    let history: ClinicalHistory =
        serde_json::from_value(Value::Object(fields)).map_err(|e| malformed(e.to_string()))?;
    validate_clinical_history(&history)?;
    Ok(history)
}

/// `45.0` is read as 45; fractional ages stay floats and fail to deserialize.
fn normalize_whole_age(fields: &mut Map<String, Value>) {
    let Some(age) = fields.get_mut("patientAge") else {
        return;
    };
    if !age.is_f64() {
        return;
    }
    if let Some(whole) = age
        .as_f64()
        .filter(|a| a.fract() == 0.0 && a.abs() < i64::MAX as f64)
    {
        *age = Value::from(whole as i64);
    }
}

pub fn validate_clinical_history(history: &ClinicalHistory) -> Result<(), ClinicalHistoryError> {
    if let Some(age) = history.patient_age {
        if !(0..=MAX_PATIENT_AGE).contains(&age) {
            return Err(ClinicalHistoryError::AgeOutOfRange(age));
        }
    }
    check_length(
        "chiefComplaint",
        history.chief_complaint.as_deref(),
        MAX_CHIEF_COMPLAINT_CHARS,
    )?;
    check_length(
        "medicalHistory",
        history.medical_history.as_deref(),
        MAX_MEDICAL_HISTORY_CHARS,
    )
}

fn check_length(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ClinicalHistoryError> {
    let actual = value.map(|v| v.chars().count()).unwrap_or(0);
    if actual > max {
        return Err(ClinicalHistoryError::TooLong { field, max, actual });
    }
    Ok(())
}

/// Returns every failing field, empty when the form is valid.
pub fn validate_contact(request: &ContactRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if request.name.chars().count() < 2 {
        errors.push(FieldError {
            field: "name",
            message: "Name must be at least 2 characters",
        });
    }
    if !EMAIL_PATTERN.is_match(&request.email) {
        errors.push(FieldError {
            field: "email",
            message: "Please enter a valid email address",
        });
    }
    if request.subject.chars().count() < 5 {
        errors.push(FieldError {
            field: "subject",
            message: "Subject must be at least 5 characters",
        });
    }
    if request.message.chars().count() < 10 {
        errors.push(FieldError {
            field: "message",
            message: "Message must be at least 10 characters",
        });
    }
    errors
}
