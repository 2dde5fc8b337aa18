//! Acceptance memory: durable store of evidence the Critic accepted in
//! past turns, read back as a small bias on the CRAG sufficiency threshold.
//!
//! Backed by the `critic_acceptance_memory` table, realized as the
//! `migrations/0001_create_acceptance_memory.sql` migration run via
//! `sqlx::migrate!`.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct AcceptanceRecord {
    pub research_query: String,
    pub query_embedding: Vec<f32>,
    pub pmid: String,
    pub study_type: Option<String>,
    pub publication_year: Option<i32>,
    pub relevance_score: f64,
    pub methodology_score: f64,
    pub quality_score: f64,
    pub iteration: i32,
}

const SIMILARITY_THRESHOLD: f64 = 0.75;
const SIMILARITY_LIMIT: i64 = 10;

pub struct AcceptanceMemory {
    pool: PgPool,
}

impl AcceptanceMemory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts one row per accepted paper. Append-only; a single failed
    /// insert is logged and swallowed so one bad row never drops the rest of
    /// the batch.
    pub async fn record_accepted(&self, records: &[AcceptanceRecord]) {
        for r in records {
            if let Err(e) = self.insert_one(r).await {
                tracing::warn!(pmid = %r.pmid, error = %e, "failed to record accepted paper, skipping");
            }
        }
    }

    async fn insert_one(&self, r: &AcceptanceRecord) -> Result<()> {
        let embedding = Vector::from(r.query_embedding.clone());
        sqlx::query(
            "INSERT INTO critic_acceptance_memory
                (id, research_query, query_embedding, pmid, study_type, publication_year,
                 relevance_score, methodology_score, quality_score, iteration)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::new_v4())
        .bind(&r.research_query)
        .bind(embedding)
        .bind(&r.pmid)
        .bind(&r.study_type)
        .bind(r.publication_year)
        .bind(r.relevance_score)
        .bind(r.methodology_score)
        .bind(r.quality_score)
        .bind(r.iteration)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// `fetch_memory_bias`: exact-hash match first, else embedding similarity
    /// search; clamped to `[0, max_boost]`. Never propagates a storage
    /// error -- degrades to 0.0 instead.
    pub async fn fetch_memory_bias(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        max_boost: f64,
        decay_lambda: f64,
    ) -> f64 {
        match self.fetch_memory_bias_inner(query, query_embedding, decay_lambda).await {
            Ok(bias) => bias.clamp(0.0, max_boost),
            Err(e) => {
                tracing::warn!(error = %e, "acceptance memory read failed, degrading bias to 0.0");
                0.0
            }
        }
    }

    async fn fetch_memory_bias_inner(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        decay_lambda: f64,
    ) -> Result<f64> {
        let normalized = query.trim().to_lowercase();
        let digest = md5::compute(normalized.as_bytes());
        let query_hash = format!("{digest:x}");

        let exact: Vec<(f64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT quality_score, accepted_at FROM critic_acceptance_memory WHERE query_hash = $1",
        )
        .bind(&query_hash)
        .fetch_all(&self.pool)
        .await?;

        if !exact.is_empty() {
            return Ok(weighted_bias(exact.into_iter().map(|(q, t)| (q, 1.0, t)), decay_lambda));
        }

        let Some(embedding) = query_embedding else { return Ok(0.0) };
        let vector = Vector::from(embedding.to_vec());

        let rows: Vec<(f64, DateTime<Utc>, f64)> = sqlx::query_as(
            "SELECT quality_score, accepted_at, 1 - (query_embedding <=> $1) AS similarity
             FROM critic_acceptance_memory
             WHERE 1 - (query_embedding <=> $1) >= $2
             ORDER BY similarity DESC
             LIMIT $3",
        )
        .bind(vector)
        .bind(SIMILARITY_THRESHOLD)
        .bind(SIMILARITY_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(weighted_bias(rows.into_iter().map(|(q, t, sim)| (q, sim, t)), decay_lambda))
    }
}

fn weighted_bias(rows: impl Iterator<Item = (f64, f64, DateTime<Utc>)>, decay_lambda: f64) -> f64 {
    let now = Utc::now();
    let mut contribs = Vec::new();
    for (quality, similarity, accepted_at) in rows {
        let age_days = now.signed_duration_since(accepted_at).num_seconds() as f64 / 86_400.0;
        let weight = similarity * (-decay_lambda * age_days.max(0.0)).exp();
        contribs.push(quality * weight);
    }
    if contribs.is_empty() {
        return 0.0;
    }
    contribs.iter().sum::<f64>() / contribs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_bias_of_no_rows_is_zero() {
        assert_eq!(weighted_bias(std::iter::empty(), 0.01), 0.0);
    }

    #[test]
    fn weighted_bias_decays_with_age() {
        let now = Utc::now();
        let fresh = weighted_bias(std::iter::once((0.9, 1.0, now)), 0.01);
        let stale = weighted_bias(std::iter::once((0.9, 1.0, now - chrono::Duration::days(365))), 0.01);
        assert!(stale < fresh);
    }

    #[test]
    fn fetch_memory_bias_clamp_never_exceeds_max_boost() {
        let now = Utc::now();
        let max_boost = 0.15;
        let bias = weighted_bias((0..20).map(|_| (1.0, 1.0, now)), 0.01).clamp(0.0, max_boost);
        assert!(bias <= max_boost);
    }
}
