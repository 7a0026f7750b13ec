//! Backfill pipeline orchestration: load, sample, score, synthesize, write.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rtrack_core::scoring::ELIGIBILITY_THRESHOLD;
use rtrack_core::SynthesizedBatch;
use rtrack_storage::StoreTotals;
use serde::Serialize;
use sqlx::Connection;
use tracing::{info, Instrument};
use uuid::Uuid;

pub mod sampler;
pub mod synth;

use sampler::{pick_job_role, sample_candidates, DEFAULT_SAMPLE_SIZE};
use synth::{RecordSynthesizer, SynthesisOutcome};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://backend/database/recruitment.db";

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub database_url: String,
    pub sample_size: usize,
    pub seed: Option<u64>,
    pub eligibility_threshold: f64,
    /// Run everything but roll the transaction back instead of committing.
    pub dry_run: bool,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            seed: None,
            eligibility_threshold: ELIGIBILITY_THRESHOLD,
            dry_run: false,
        }
    }
}

impl BackfillConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            sample_size: lookup("RTRACK_SAMPLE_SIZE")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.sample_size),
            seed: lookup("RTRACK_SEED").and_then(|v| v.trim().parse().ok()),
            eligibility_threshold: lookup("RTRACK_ELIGIBILITY_THRESHOLD")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.eligibility_threshold),
            dry_run: lookup("RTRACK_DRY_RUN")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
                .unwrap_or(defaults.dry_run),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackfillSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub job_roles: usize,
    pub candidates: usize,
    pub sampled_candidates: usize,
    /// Sampled candidates with no remaining role to apply to.
    pub skipped_candidates: usize,
    pub applications: usize,
    pub analyses: usize,
    pub tests: usize,
    pub decisions: usize,
    pub eligible: usize,
    pub committed: bool,
    pub totals: StoreTotals,
}

pub struct BackfillPipeline {
    config: BackfillConfig,
}

impl BackfillPipeline {
    pub fn new(config: BackfillConfig) -> Self {
        Self { config }
    }

    /// Run once against the configured store, seeding from config or entropy.
    pub async fn run_once(&self) -> Result<BackfillSummary> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.run_with(&mut rng, Local::now().naive_local()).await
    }

    /// Run with an explicit RNG and clock.
    pub async fn run_with(&self, rng: &mut StdRng, now: NaiveDateTime) -> Result<BackfillSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("backfill", %run_id, dry_run = self.config.dry_run);
        self.run_inner(run_id, rng, now).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        rng: &mut StdRng,
        now: NaiveDateTime,
    ) -> Result<BackfillSummary> {
        let started_at = Utc::now();
        let mut conn = rtrack_storage::connect(&self.config.database_url)
            .await
            .with_context(|| format!("opening store {}", self.config.database_url))?;
        let mut tx = conn.begin().await.context("beginning backfill transaction")?;

        let job_roles = rtrack_storage::load_job_roles(&mut *tx)
            .await
            .context("loading job roles")?;
        let candidates = rtrack_storage::load_candidates(&mut *tx)
            .await
            .context("loading candidates")?;

        let selected = sample_candidates(&candidates, self.config.sample_size, rng);
        info!(selected = selected.len(), "sampled candidates");

        let mut ids = rtrack_storage::load_id_sequence(&mut *tx)
            .await
            .context("reading current id maxima")?;
        let synthesizer = RecordSynthesizer::new(now, self.config.eligibility_threshold, rng);

        let mut batch = SynthesizedBatch::default();
        let mut skipped = 0usize;
        let mut eligible = 0usize;
        for candidate in &selected {
            let Some(role) = pick_job_role(candidate, &job_roles, rng) else {
                skipped += 1;
                continue;
            };
            if synthesizer.synthesize(candidate, role, &mut ids, rng, &mut batch)
                == SynthesisOutcome::Eligible
            {
                eligible += 1;
            }
        }
        info!(
            applications = batch.applications.len(),
            tests = batch.tests.len(),
            skipped,
            "synthesized records"
        );

        rtrack_storage::insert_batch(&mut *tx, &batch)
            .await
            .context("inserting synthesized records")?;

        let committed = if self.config.dry_run {
            tx.rollback().await.context("rolling back dry run")?;
            false
        } else {
            tx.commit().await.context("committing backfill")?;
            true
        };

        let totals = rtrack_storage::load_totals(&mut conn)
            .await
            .context("reading store totals")?;
        info!(committed, ?totals, "backfill finished");

        Ok(BackfillSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            job_roles: job_roles.len(),
            candidates: candidates.len(),
            sampled_candidates: selected.len(),
            skipped_candidates: skipped,
            applications: batch.applications.len(),
            analyses: batch.analyses.len(),
            tests: batch.tests.len(),
            decisions: batch.decisions.len(),
            eligible,
            committed,
            totals,
        })
    }
}

/// Store totals without writing anything.
pub async fn store_totals(database_url: &str) -> Result<StoreTotals> {
    let mut conn = rtrack_storage::connect(database_url)
        .await
        .with_context(|| format!("opening store {database_url}"))?;
    rtrack_storage::load_totals(&mut conn)
        .await
        .context("reading store totals")
}
