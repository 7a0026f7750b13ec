//! Core domain model for the recruitment tracker backfill.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub mod scoring;

pub use scoring::{PerformanceLevel, SkillPerformance};

pub type CandidateId = i64;
pub type RoleId = i64;

/// Experience band stored on prior analyses. Unknown values are kept verbatim
/// so they can be written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExperienceLevel {
    Entry,
    #[default]
    Mid,
    Senior,
    Unrecognized(String),
}

impl ExperienceLevel {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "entry" => Self::Entry,
            "mid" => Self::Mid,
            "senior" => Self::Senior,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Entry => "entry",
            Self::Mid => "mid",
            Self::Senior => "senior",
            Self::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ExperienceLevel {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ExperienceLevel> for String {
    fn from(value: ExperienceLevel) -> Self {
        value.as_str().to_string()
    }
}

/// Existing candidate enriched with the profile inferred from prior analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub education: String,
    pub experience_years: i64,
    pub experience_level: ExperienceLevel,
    pub applied_roles: BTreeSet<RoleId>,
}

impl Candidate {
    pub fn has_applied_to(&self, role_id: RoleId) -> bool {
        self.applied_roles.contains(&role_id)
    }
}

/// Profile fields used when a candidate has no prior analysis row.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateProfile {
    pub skills: Vec<String>,
    pub certifications: Vec<String>,
    pub education: String,
    pub experience_years: i64,
    pub experience_level: ExperienceLevel,
}

impl Default for CandidateProfile {
    fn default() -> Self {
        Self {
            skills: Vec::new(),
            certifications: Vec::new(),
            education: "Bachelor's in Cybersecurity".to_string(),
            experience_years: 3,
            experience_level: ExperienceLevel::Mid,
        }
    }
}

/// Per-dimension weights for the AI score. Expected to sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub skills: f64,
    pub knowledge: f64,
    pub tasks: f64,
    pub certifications: f64,
    pub education: f64,
}

impl ScoringWeights {
    pub const KEYS: [&'static str; 5] = [
        "skills",
        "knowledge",
        "tasks",
        "certifications",
        "education",
    ];

    pub fn total(&self) -> f64 {
        self.skills + self.knowledge + self.tasks + self.certifications + self.education
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            skills: 0.40,
            knowledge: 0.25,
            tasks: 0.20,
            certifications: 0.10,
            education: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRole {
    pub role_id: RoleId,
    pub title: String,
    pub weights: ScoringWeights,
    /// Per-role threshold as stored. Not used by the eligibility gate.
    pub threshold_score: f64,
    pub skill_keywords: Vec<String>,
}

impl JobRole {
    pub const DEFAULT_THRESHOLD: f64 = 60.0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    TestCompleted,
    NotEligible,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestCompleted => "test_completed",
            Self::NotEligible => "not_eligible",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub application_id: i64,
    pub candidate_id: CandidateId,
    pub role_id: RoleId,
    pub status: ApplicationStatus,
    pub applied_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub analysis_id: i64,
    pub application_id: i64,
    pub ai_score: f64,
    pub skills_matched: Vec<String>,
    pub skill_gaps: Vec<String>,
    pub experience_years: i64,
    pub experience_level: ExperienceLevel,
    pub education: String,
    pub certifications: Vec<String>,
    pub reasoning: String,
    pub analysis_completed_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_id: i64,
    pub application_id: i64,
    pub test_token: String,
    pub test_score: f64,
    pub started_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
    pub duration_minutes: i64,
    pub answers: Vec<String>,
    pub verification_details: BTreeMap<String, SkillPerformance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: i64,
    pub application_id: i64,
    pub composite_score: f64,
    pub resume_weight: i64,
    pub test_weight: i64,
    pub decided_by: i64,
}

/// Everything synthesized in one run, written in a single commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SynthesizedBatch {
    pub applications: Vec<Application>,
    pub analyses: Vec<AiAnalysis>,
    pub tests: Vec<TestRecord>,
    pub decisions: Vec<Decision>,
}

impl SynthesizedBatch {
    pub fn is_empty(&self) -> bool {
        self.applications.is_empty()
    }
}

/// Explicit id allocator threaded through synthesis in place of global counters.
///
/// Seeded from `MAX(id) + 1` per table; assumes a single writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdSequence {
    next_application: i64,
    next_analysis: i64,
    next_test: i64,
    next_decision: i64,
}

impl IdSequence {
    /// Build from the current per-table maxima (`None` for an empty table).
    pub fn after_max(
        application: Option<i64>,
        analysis: Option<i64>,
        test: Option<i64>,
        decision: Option<i64>,
    ) -> Self {
        Self {
            next_application: application.unwrap_or(0) + 1,
            next_analysis: analysis.unwrap_or(0) + 1,
            next_test: test.unwrap_or(0) + 1,
            next_decision: decision.unwrap_or(0) + 1,
        }
    }

    pub fn next_application(&mut self) -> i64 {
        take(&mut self.next_application)
    }

    pub fn next_analysis(&mut self) -> i64 {
        take(&mut self.next_analysis)
    }

    pub fn next_test(&mut self) -> i64 {
        take(&mut self.next_test)
    }

    pub fn next_decision(&mut self) -> i64 {
        take(&mut self.next_decision)
    }
}

fn take(slot: &mut i64) -> i64 {
    let id = *slot;
    *slot += 1;
    id
}
