use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::info;

use crate::models::{
    AnalysisResult, Gender, MedicalAnalysisRecord, NewAnalysisRecord, Recommendations,
};
use crate::store::{AnalysisStore, StoreError, StoreResult};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS medical_analyses (
    id               BIGSERIAL PRIMARY KEY,
    image_filename   TEXT NOT NULL,
    image_base64     TEXT NOT NULL,
    patient_age      BIGINT,
    patient_gender   TEXT,
    chief_complaint  TEXT,
    medical_history  TEXT,
    analysis_results JSONB NOT NULL,
    ai_explanation   TEXT NOT NULL,
    recommendations  JSONB NOT NULL,
    confidence       INTEGER NOT NULL,
    processing_time  BIGINT NOT NULL,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const COLUMNS: &str = "id, image_filename, image_base64, patient_age, patient_gender, \
    chief_complaint, medical_history, analysis_results, ai_explanation, recommendations, \
    confidence, processing_time, created_at";

/// Durable AnalysisStore backed by PostgreSQL; ids come from the table sequence.
pub struct PostgresAnalysisStore {
    pool: PgPool,
}

impl PostgresAnalysisStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        info!("PostgreSQL analysis store ready");
        Ok(Self { pool })
    }
}

fn record_from_row(row: &PgRow) -> StoreResult<MedicalAnalysisRecord> {
    let id: i64 = row.try_get("id")?;

    let patient_gender = row
        .try_get::<Option<String>, _>("patient_gender")?
        .map(|g| {
            Gender::parse(&g).ok_or_else(|| StoreError::Corrupt {
                id,
                reason: format!("unknown gender '{g}'"),
            })
        })
        .transpose()?;

    let confidence: i32 = row.try_get("confidence")?;
    let confidence = u8::try_from(confidence).map_err(|_| StoreError::Corrupt {
        id,
        reason: format!("confidence {confidence} out of range"),
    })?;

    let Json(analysis_results): Json<AnalysisResult> = row.try_get("analysis_results")?;
    let Json(recommendations): Json<Recommendations> = row.try_get("recommendations")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(MedicalAnalysisRecord {
        id,
        image_filename: row.try_get("image_filename")?,
        image_base64: row.try_get("image_base64")?,
        patient_age: row.try_get("patient_age")?,
        patient_gender,
        chief_complaint: row.try_get("chief_complaint")?,
        medical_history: row.try_get("medical_history")?,
        analysis_results,
        ai_explanation: row.try_get("ai_explanation")?,
        recommendations,
        confidence,
        processing_time: row.try_get("processing_time")?,
        created_at,
    })
}

#[async_trait]
impl AnalysisStore for PostgresAnalysisStore {
    async fn create(&self, record: NewAnalysisRecord) -> StoreResult<MedicalAnalysisRecord> {
        let query = format!(
            "INSERT INTO medical_analyses (image_filename, image_base64, patient_age, \
             patient_gender, chief_complaint, medical_history, analysis_results, ai_explanation, \
             recommendations, confidence, processing_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&record.image_filename)
            .bind(&record.image_base64)
            .bind(record.patient_age)
            .bind(record.patient_gender.map(|g| g.as_str()))
            .bind(&record.chief_complaint)
            .bind(&record.medical_history)
            .bind(Json(&record.analysis_results))
            .bind(&record.ai_explanation)
            .bind(Json(&record.recommendations))
            .bind(i32::from(record.confidence))
            .bind(record.processing_time)
            .fetch_one(&self.pool)
            .await?;
        record_from_row(&row)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<MedicalAnalysisRecord>> {
        let query = format!("SELECT {COLUMNS} FROM medical_analyses WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn list(&self) -> StoreResult<Vec<MedicalAnalysisRecord>> {
        let query = format!("SELECT {COLUMNS} FROM medical_analyses ORDER BY id");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_record;

    /// Requires a reachable PostgreSQL.
    /// Usage: DATABASE_URL=postgres://... cargo test test_postgres_round_trip
    #[tokio::test]
    async fn test_postgres_round_trip() -> anyhow::Result<()> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            println!("Skipping test - set DATABASE_URL environment variable");
            return Ok(());
        };

        let store = PostgresAnalysisStore::connect(&database_url).await?;
        let first = store.create(sample_record("pg-a.png")).await?;
        let second = store.create(sample_record("pg-b.png")).await?;
        assert!(second.id > first.id);

        let fetched = store.get(first.id).await?.expect("record exists");
        assert_eq!(fetched.image_filename, "pg-a.png");
        assert_eq!(fetched.analysis_results, first.analysis_results);
        assert_eq!(fetched.ai_explanation, first.ai_explanation);

        let ids: Vec<_> = store.list().await?.into_iter().map(|r| r.id).collect();
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
        Ok(())
    }
}
