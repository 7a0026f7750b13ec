//! Scoring heuristics shared with the candidate generator.
//!
//! AI score is a deterministic function of the candidate profile and the job
//! role weights. Test score and per-skill performance are synthetic: they add
//! uniform noise drawn from the caller's RNG so a seeded run is reproducible.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Candidate, ExperienceLevel, JobRole};

/// Fixed eligibility gate. Independent of `JobRole::threshold_score`.
pub const ELIGIBILITY_THRESHOLD: f64 = 60.0;

pub const TEST_SCORE_MIN: f64 = 40.0;
pub const TEST_SCORE_MAX: f64 = 95.0;
pub const TEST_SCORE_NOISE: f64 = 15.0;

pub const SKILL_SCORE_MIN: f64 = 40.0;
pub const SKILL_SCORE_MAX: f64 = 100.0;
pub const SKILL_SCORE_NOISE: f64 = 10.0;

/// Only the first few matched skills get a performance breakdown.
pub const MAX_SKILL_BREAKDOWN: usize = 5;

/// Years of experience at which the knowledge term saturates.
const KNOWLEDGE_SATURATION_YEARS: f64 = 5.0;

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiScoreBreakdown {
    pub skill: f64,
    pub knowledge: f64,
    pub task: f64,
    pub certification: f64,
    pub education: f64,
    /// Sum of the five terms, rounded to one decimal.
    pub total: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
}

impl ExperienceLevel {
    pub fn task_factor(&self) -> f64 {
        match self {
            Self::Entry => 0.6,
            Self::Mid => 0.8,
            Self::Senior => 1.0,
            Self::Unrecognized(_) => 0.7,
        }
    }

    /// AI/test blend for the composite score. Unknown levels use the mid blend.
    pub fn composite_weights(&self) -> CompositeWeights {
        match self {
            Self::Entry => CompositeWeights { ai: 0.7, test: 0.3 },
            Self::Senior => CompositeWeights { ai: 0.3, test: 0.7 },
            Self::Mid | Self::Unrecognized(_) => CompositeWeights::MID,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositeWeights {
    pub ai: f64,
    pub test: f64,
}

impl CompositeWeights {
    pub const MID: Self = Self { ai: 0.4, test: 0.6 };

    /// Weights as whole percentages, the form stored on decisions.
    pub fn as_percentages(&self) -> (i64, i64) {
        ((self.ai * 100.0).round() as i64, (self.test * 100.0).round() as i64)
    }
}

pub fn score_candidate(candidate: &Candidate, role: &JobRole) -> AiScoreBreakdown {
    let weights = &role.weights;
    let required = &role.skill_keywords;

    let matched_skills: Vec<String> = candidate
        .skills
        .iter()
        .filter(|skill| required.contains(skill))
        .cloned()
        .collect();
    let missing_skills: Vec<String> = required
        .iter()
        .filter(|skill| !matched_skills.contains(skill))
        .cloned()
        .collect();

    let skill_match = matched_skills.len() as f64 / required.len().max(1) as f64;
    let skill = skill_match * 100.0 * weights.skills;

    let knowledge = (candidate.experience_years as f64 / KNOWLEDGE_SATURATION_YEARS).min(1.0)
        * 100.0
        * weights.knowledge;

    let task = candidate.experience_level.task_factor() * 100.0 * weights.tasks;

    let cert_factor = if candidate.certifications.is_empty() { 0.5 } else { 1.0 };
    let certification = cert_factor * 100.0 * weights.certifications;

    let edu_factor = if has_degree(&candidate.education) { 1.0 } else { 0.7 };
    let education = edu_factor * 100.0 * weights.education;

    AiScoreBreakdown {
        skill,
        knowledge,
        task,
        certification,
        education,
        total: round1(skill + knowledge + task + certification + education),
        matched_skills,
        missing_skills,
    }
}

fn has_degree(education: &str) -> bool {
    education.contains("Bachelor") || education.contains("Master")
}

pub fn is_eligible(ai_score: f64, threshold: f64) -> bool {
    ai_score >= threshold
}

pub fn generate_test_score<R: Rng + ?Sized>(ai_score: f64, rng: &mut R) -> f64 {
    let variation = rng.gen_range(-TEST_SCORE_NOISE..=TEST_SCORE_NOISE);
    round1((ai_score + variation).clamp(TEST_SCORE_MIN, TEST_SCORE_MAX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceLevel {
    Strong,
    Moderate,
    Weak,
}

impl PerformanceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::Strong
        } else if score >= 50.0 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillPerformance {
    pub percentage: f64,
    pub level: PerformanceLevel,
}

pub fn generate_skill_performance<R: Rng + ?Sized>(
    matched_skills: &[String],
    test_score: f64,
    rng: &mut R,
) -> BTreeMap<String, SkillPerformance> {
    let mut performance = BTreeMap::new();
    for skill in matched_skills.iter().take(MAX_SKILL_BREAKDOWN) {
        let variation = rng.gen_range(-SKILL_SCORE_NOISE..=SKILL_SCORE_NOISE);
        let score = (test_score + variation).clamp(SKILL_SCORE_MIN, SKILL_SCORE_MAX);
        performance.insert(
            skill.clone(),
            SkillPerformance {
                percentage: round1(score),
                level: PerformanceLevel::from_score(score),
            },
        );
    }
    performance
}

pub fn composite_score(ai_score: f64, test_score: f64, level: &ExperienceLevel) -> f64 {
    let w = level.composite_weights();
    round1(ai_score * w.ai + test_score * w.test)
}
