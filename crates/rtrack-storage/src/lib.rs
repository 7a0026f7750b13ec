//! SQLite access for the recruitment store: loaders, id sequencing and the batch writer.
//!
//! Every function takes a `&mut SqliteConnection` so callers can pass either a
//! bare connection or `&mut *tx` from the run's single transaction.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use chrono::NaiveDateTime;
use rtrack_core::{
    Candidate, CandidateProfile, ExperienceLevel, IdSequence, JobRole, RoleId, ScoringWeights,
    SynthesizedBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{ConnectOptions, Decode, Row, Sqlite, SqliteConnection, Type};
use thiserror::Error;
use tracing::{debug, info};

/// Timestamp layout used by every text timestamp column in the store.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("malformed {column} JSON in {table} row {row_id}: {source}")]
    MalformedJson {
        table: &'static str,
        column: &'static str,
        row_id: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error("scoring_weights for job role {role_id} is missing `{key}`")]
    MissingWeight { role_id: RoleId, key: &'static str },
    #[error("serializing {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertCounts {
    pub applications: usize,
    pub analyses: usize,
    pub tests: usize,
    pub decisions: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreTotals {
    pub candidates: i64,
    pub job_roles: i64,
    pub applications: i64,
    pub tests: i64,
    pub decisions: i64,
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Open a single connection to an existing store. A missing database file is an error.
pub async fn connect(database_url: &str) -> Result<SqliteConnection, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?;
    Ok(options.connect().await?)
}

pub async fn load_job_roles(conn: &mut SqliteConnection) -> Result<Vec<JobRole>, StoreError> {
    let rows = sqlx::query("SELECT * FROM job_roles ORDER BY role_id")
        .fetch_all(&mut *conn)
        .await?;

    let mut roles = Vec::with_capacity(rows.len());
    for row in rows {
        let role_id: RoleId = row.try_get("role_id")?;
        let skill_keywords = match optional_column::<String>(&row, "skill_keywords")? {
            Some(raw) if !raw.trim().is_empty() => {
                decode_json("job_roles", "skill_keywords", role_id, &raw)?
            }
            _ => Vec::new(),
        };
        let weights = match optional_column::<String>(&row, "scoring_weights")? {
            Some(raw) if !raw.trim().is_empty() => parse_weights(role_id, &raw)?,
            _ => ScoringWeights::default(),
        };
        roles.push(JobRole {
            role_id,
            title: row.try_get("title")?,
            weights,
            threshold_score: optional_number(&row, "threshold_score")?
                .unwrap_or(JobRole::DEFAULT_THRESHOLD),
            skill_keywords,
        });
    }

    info!(job_roles = roles.len(), "loaded job roles");
    Ok(roles)
}

/// Load every candidate with the role ids already applied to and the profile
/// carried by their most recent prior analysis.
pub async fn load_candidates(conn: &mut SqliteConnection) -> Result<Vec<Candidate>, StoreError> {
    let rows = sqlx::query(
        r#"
        SELECT c.candidate_id, c.name, c.email, c.phone,
               GROUP_CONCAT(a.role_id) AS applied_roles
          FROM candidates c
          LEFT JOIN applications a ON c.candidate_id = a.candidate_id
         GROUP BY c.candidate_id
         ORDER BY c.candidate_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut candidates = Vec::with_capacity(rows.len());
    let mut without_profile = 0usize;
    for row in rows {
        let candidate_id: i64 = row.try_get("candidate_id")?;
        let applied_roles = parse_applied_roles(row.try_get("applied_roles")?);
        let profile = match load_latest_profile(conn, candidate_id).await? {
            Some(profile) => profile,
            None => {
                without_profile += 1;
                CandidateProfile::default()
            }
        };

        candidates.push(Candidate {
            candidate_id,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            skills: profile.skills,
            certifications: profile.certifications,
            education: profile.education,
            experience_years: profile.experience_years,
            experience_level: profile.experience_level,
            applied_roles,
        });
    }

    info!(
        candidates = candidates.len(),
        without_profile, "loaded candidates"
    );
    Ok(candidates)
}

async fn load_latest_profile(
    conn: &mut SqliteConnection,
    candidate_id: i64,
) -> Result<Option<CandidateProfile>, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT an.analysis_id, an.skills_matched, an.certifications, an.education,
               an.experience_years, an.experience_level
          FROM ai_analysis an
          JOIN applications a ON a.application_id = an.application_id
         WHERE a.candidate_id = ?
         ORDER BY an.analysis_id DESC
         LIMIT 1
        "#,
    )
    .bind(candidate_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let analysis_id: i64 = row.try_get("analysis_id")?;
    let defaults = CandidateProfile::default();

    let skills = json_list(&row, "skills_matched", analysis_id)?;
    let certifications = json_list(&row, "certifications", analysis_id)?;
    let education: Option<String> = row.try_get("education")?;
    let experience_years: Option<i64> = row.try_get("experience_years")?;
    let experience_level: Option<String> = row.try_get("experience_level")?;

    Ok(Some(CandidateProfile {
        skills,
        certifications,
        education: education.unwrap_or(defaults.education),
        experience_years: experience_years.unwrap_or(defaults.experience_years),
        experience_level: experience_level
            .as_deref()
            .map(ExperienceLevel::parse)
            .unwrap_or(defaults.experience_level),
    }))
}

/// Read the current per-table maxima and start the sequence just past them.
pub async fn load_id_sequence(conn: &mut SqliteConnection) -> Result<IdSequence, StoreError> {
    let application = max_id(conn, "applications", "application_id").await?;
    let analysis = max_id(conn, "ai_analysis", "analysis_id").await?;
    let test = max_id(conn, "tests", "test_id").await?;
    let decision = max_id(conn, "decisions", "decision_id").await?;
    debug!(?application, ?analysis, ?test, ?decision, "current id maxima");
    Ok(IdSequence::after_max(application, analysis, test, decision))
}

async fn max_id(
    conn: &mut SqliteConnection,
    table: &'static str,
    column: &'static str,
) -> Result<Option<i64>, StoreError> {
    let row = sqlx::query(&format!("SELECT MAX({column}) AS max_id FROM {table}"))
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.try_get("max_id")?)
}

/// Insert a synthesized batch. Commit is the caller's concern.
pub async fn insert_batch(
    conn: &mut SqliteConnection,
    batch: &SynthesizedBatch,
) -> Result<InsertCounts, StoreError> {
    for app in &batch.applications {
        sqlx::query(
            r#"
            INSERT INTO applications
                (application_id, candidate_id, role_id, status, applied_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(app.application_id)
        .bind(app.candidate_id)
        .bind(app.role_id)
        .bind(app.status.as_str())
        .bind(format_timestamp(&app.applied_at))
        .bind(format_timestamp(&app.updated_at))
        .execute(&mut *conn)
        .await?;
    }

    for analysis in &batch.analyses {
        sqlx::query(
            r#"
            INSERT INTO ai_analysis (
                analysis_id, application_id, ai_score, skills_matched, skill_gaps,
                experience_years, experience_level, education, certifications, reasoning,
                analysis_completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(analysis.analysis_id)
        .bind(analysis.application_id)
        .bind(analysis.ai_score)
        .bind(encode_json("skills_matched", &analysis.skills_matched)?)
        .bind(encode_json("skill_gaps", &analysis.skill_gaps)?)
        .bind(analysis.experience_years)
        .bind(analysis.experience_level.as_str())
        .bind(&analysis.education)
        .bind(encode_json("certifications", &analysis.certifications)?)
        .bind(&analysis.reasoning)
        .bind(format_timestamp(&analysis.analysis_completed_at))
        .execute(&mut *conn)
        .await?;
    }

    for test in &batch.tests {
        sqlx::query(
            r#"
            INSERT INTO tests (
                test_id, application_id, test_token, test_score, started_at, completed_at,
                duration_minutes, answers, verification_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(test.test_id)
        .bind(test.application_id)
        .bind(&test.test_token)
        .bind(test.test_score)
        .bind(format_timestamp(&test.started_at))
        .bind(format_timestamp(&test.completed_at))
        .bind(test.duration_minutes)
        .bind(encode_json("answers", &test.answers)?)
        .bind(encode_json("verification_details", &test.verification_details)?)
        .execute(&mut *conn)
        .await?;
    }

    for decision in &batch.decisions {
        sqlx::query(
            r#"
            INSERT INTO decisions (
                decision_id, application_id, composite_score, resume_weight, test_weight, decided_by
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(decision.decision_id)
        .bind(decision.application_id)
        .bind(decision.composite_score)
        .bind(decision.resume_weight)
        .bind(decision.test_weight)
        .bind(decision.decided_by)
        .execute(&mut *conn)
        .await?;
    }

    let counts = InsertCounts {
        applications: batch.applications.len(),
        analyses: batch.analyses.len(),
        tests: batch.tests.len(),
        decisions: batch.decisions.len(),
    };
    info!(?counts, "inserted synthesized batch");
    Ok(counts)
}

pub async fn load_totals(conn: &mut SqliteConnection) -> Result<StoreTotals, StoreError> {
    Ok(StoreTotals {
        candidates: count_rows(conn, "candidates").await?,
        job_roles: count_rows(conn, "job_roles").await?,
        applications: count_rows(conn, "applications").await?,
        tests: count_rows(conn, "tests").await?,
        decisions: count_rows(conn, "decisions").await?,
    })
}

async fn count_rows(conn: &mut SqliteConnection, table: &'static str) -> Result<i64, StoreError> {
    let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.try_get("n")?)
}

fn parse_applied_roles(raw: Option<String>) -> BTreeSet<RoleId> {
    raw.map(|joined| {
        joined
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect()
    })
    .unwrap_or_default()
}

fn parse_weights(role_id: RoleId, raw: &str) -> Result<ScoringWeights, StoreError> {
    let map: HashMap<String, f64> = decode_json("job_roles", "scoring_weights", role_id, raw)?;
    if let Some(key) = ScoringWeights::KEYS
        .iter()
        .find(|key| !map.contains_key(**key))
    {
        return Err(StoreError::MissingWeight { role_id, key: *key });
    }
    Ok(ScoringWeights {
        skills: map["skills"],
        knowledge: map["knowledge"],
        tasks: map["tasks"],
        certifications: map["certifications"],
        education: map["education"],
    })
}

fn json_list(
    row: &SqliteRow,
    column: &'static str,
    row_id: i64,
) -> Result<Vec<String>, StoreError> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(raw) if !raw.trim().is_empty() => decode_json("ai_analysis", column, row_id, &raw),
        _ => Ok(Vec::new()),
    }
}

fn decode_json<T: DeserializeOwned>(
    table: &'static str,
    column: &'static str,
    row_id: i64,
    raw: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::MalformedJson {
        table,
        column,
        row_id,
        source,
    })
}

fn encode_json<T: Serialize + ?Sized>(what: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { what, source })
}

/// Columns outside the fixed set may be absent from older stores.
fn optional_column<'r, T>(row: &'r SqliteRow, column: &str) -> Result<Option<T>, sqlx::Error>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    match row.try_get::<Option<T>, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

fn optional_number(row: &SqliteRow, column: &str) -> Result<Option<f64>, sqlx::Error> {
    match optional_column::<f64>(row, column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnDecode { .. }) => {
            Ok(optional_column::<i64>(row, column)?.map(|v| v as f64))
        }
        Err(err) => Err(err),
    }
}
