//! Record synthesis for one (candidate, job role) pair.

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use rtrack_core::scoring::{
    composite_score, generate_skill_performance, generate_test_score, is_eligible, score_candidate,
    CompositeWeights,
};
use rtrack_core::{
    AiAnalysis, Application, ApplicationStatus, Candidate, Decision, IdSequence, JobRole,
    SynthesizedBatch, TestRecord,
};
use tracing::debug;

/// Reviewer recorded on every synthesized decision.
pub const SYSTEM_REVIEWER_ID: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Eligible,
    NotEligible,
}

/// Builds records around a run-wide base time so every application in one run
/// lands in the same window.
#[derive(Debug, Clone)]
pub struct RecordSynthesizer {
    base_time: NaiveDateTime,
    eligibility_threshold: f64,
}

impl RecordSynthesizer {
    /// Base time is `now` minus a random 1..=30 days.
    pub fn new<R: Rng + ?Sized>(
        now: NaiveDateTime,
        eligibility_threshold: f64,
        rng: &mut R,
    ) -> Self {
        let base_time = now - Duration::days(rng.gen_range(1..=30));
        Self::with_base_time(base_time, eligibility_threshold)
    }

    pub fn with_base_time(base_time: NaiveDateTime, eligibility_threshold: f64) -> Self {
        Self {
            base_time,
            eligibility_threshold,
        }
    }

    pub fn base_time(&self) -> NaiveDateTime {
        self.base_time
    }

    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        candidate: &Candidate,
        role: &JobRole,
        ids: &mut IdSequence,
        rng: &mut R,
        batch: &mut SynthesizedBatch,
    ) -> SynthesisOutcome {
        let scored = score_candidate(candidate, role);
        let ai_score = scored.total;
        let eligible = is_eligible(ai_score, self.eligibility_threshold);
        if role.threshold_score != self.eligibility_threshold {
            debug!(
                role_id = role.role_id,
                role_threshold = role.threshold_score,
                gate = self.eligibility_threshold,
                "job role threshold differs from the eligibility gate"
            );
        }

        let applied_at = self.base_time + Duration::hours(rng.gen_range(0..=48));
        let application_id = ids.next_application();

        batch.applications.push(Application {
            application_id,
            candidate_id: candidate.candidate_id,
            role_id: role.role_id,
            status: if eligible {
                ApplicationStatus::TestCompleted
            } else {
                ApplicationStatus::NotEligible
            },
            applied_at,
            updated_at: applied_at + Duration::hours(4),
        });

        batch.analyses.push(AiAnalysis {
            analysis_id: ids.next_analysis(),
            application_id,
            ai_score,
            reasoning: format!(
                "Candidate shows {} matched skills for {} position.",
                scored.matched_skills.len(),
                role.title
            ),
            skills_matched: scored.matched_skills.clone(),
            skill_gaps: scored.missing_skills,
            experience_years: candidate.experience_years,
            experience_level: candidate.experience_level.clone(),
            education: candidate.education.clone(),
            certifications: candidate.certifications.clone(),
            analysis_completed_at: applied_at + Duration::minutes(30),
        });

        debug!(
            candidate_id = candidate.candidate_id,
            role_id = role.role_id,
            ai_score,
            eligible,
            "scored application"
        );

        if !eligible {
            let (resume_weight, test_weight) = CompositeWeights::MID.as_percentages();
            batch.decisions.push(Decision {
                decision_id: ids.next_decision(),
                application_id,
                composite_score: 0.0,
                resume_weight,
                test_weight,
                decided_by: SYSTEM_REVIEWER_ID,
            });
            return SynthesisOutcome::NotEligible;
        }

        let test_score = generate_test_score(ai_score, rng);
        let verification_details =
            generate_skill_performance(&scored.matched_skills, test_score, rng);
        batch.tests.push(TestRecord {
            test_id: ids.next_test(),
            application_id,
            test_token: format!("tok_{}", rng.gen_range(100_000..=999_999)),
            test_score,
            started_at: applied_at + Duration::hours(2),
            completed_at: applied_at + Duration::hours(3),
            duration_minutes: rng.gen_range(25..=45),
            answers: Vec::new(),
            verification_details,
        });

        let level = &candidate.experience_level;
        let (resume_weight, test_weight) = level.composite_weights().as_percentages();
        batch.decisions.push(Decision {
            decision_id: ids.next_decision(),
            application_id,
            composite_score: composite_score(ai_score, test_score, level),
            resume_weight,
            test_weight,
            decided_by: SYSTEM_REVIEWER_ID,
        });

        SynthesisOutcome::Eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rtrack_core::scoring::{TEST_SCORE_MAX, TEST_SCORE_MIN};
    use rtrack_core::{ExperienceLevel, ScoringWeights};

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .expect("valid base time")
    }

    fn role(required: &[&str]) -> JobRole {
        JobRole {
            role_id: 5,
            title: "Threat Hunter".into(),
            weights: ScoringWeights::default(),
            threshold_score: 70.0,
            skill_keywords: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn candidate(level: ExperienceLevel, skills: &[&str]) -> Candidate {
        Candidate {
            candidate_id: 3,
            name: "Riley Chen".into(),
            email: None,
            phone: None,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            certifications: vec!["OSCP".into()],
            education: "Master of Engineering".into(),
            experience_years: 8,
            experience_level: level,
            applied_roles: Default::default(),
        }
    }

    #[test]
    fn eligible_pair_gets_test_and_weighted_decision() {
        let synth = RecordSynthesizer::with_base_time(base(), 60.0);
        let mut ids = IdSequence::after_max(Some(100), Some(200), Some(50), Some(100));
        let mut rng = StdRng::seed_from_u64(11);
        let mut batch = SynthesizedBatch::default();

        let c = candidate(ExperienceLevel::Senior, &["YARA", "Zeek", "Sigma"]);
        let r = role(&["YARA", "Zeek", "Sigma"]);
        let outcome = synth.synthesize(&c, &r, &mut ids, &mut rng, &mut batch);

        assert_eq!(outcome, SynthesisOutcome::Eligible);
        let app = &batch.applications[0];
        assert_eq!(app.application_id, 101);
        assert_eq!(app.status, ApplicationStatus::TestCompleted);
        assert!(app.applied_at >= base() && app.applied_at <= base() + Duration::hours(48));
        assert_eq!(app.updated_at - app.applied_at, Duration::hours(4));

        let analysis = &batch.analyses[0];
        assert_eq!(analysis.analysis_id, 201);
        assert_eq!(analysis.ai_score, 100.0);
        assert_eq!(
            analysis.reasoning,
            "Candidate shows 3 matched skills for Threat Hunter position."
        );

        let test = &batch.tests[0];
        assert_eq!(test.test_id, 51);
        assert_eq!(test.application_id, 101);
        assert!((TEST_SCORE_MIN..=TEST_SCORE_MAX).contains(&test.test_score));
        assert!(test.started_at < test.completed_at);
        assert!(test.started_at > analysis.analysis_completed_at);
        assert!((25..=45).contains(&test.duration_minutes));
        assert_eq!(test.test_token.len(), "tok_".len() + 6);
        assert_eq!(test.verification_details.len(), 3);

        let decision = &batch.decisions[0];
        assert_eq!(decision.decision_id, 101);
        assert_eq!((decision.resume_weight, decision.test_weight), (30, 70));
        assert!(decision.composite_score > 0.0);
    }

    #[test]
    fn ineligible_pair_gets_zero_decision_and_no_test() {
        let synth = RecordSynthesizer::with_base_time(base(), 60.0);
        let mut ids = IdSequence::after_max(None, None, None, None);
        let mut rng = StdRng::seed_from_u64(3);
        let mut batch = SynthesizedBatch::default();

        // 0 skills + knowledge 25 + entry task 12 + cert 10 + edu 5 = 52
        let c = candidate(ExperienceLevel::Entry, &[]);
        let outcome = synth.synthesize(&c, &role(&["YARA"]), &mut ids, &mut rng, &mut batch);

        assert_eq!(outcome, SynthesisOutcome::NotEligible);
        assert_eq!(batch.analyses[0].ai_score, 52.0);
        assert_eq!(batch.applications[0].status, ApplicationStatus::NotEligible);
        assert!(batch.tests.is_empty());
        let decision = &batch.decisions[0];
        assert_eq!(decision.composite_score, 0.0);
        assert_eq!((decision.resume_weight, decision.test_weight), (40, 60));
        assert_eq!(batch.analyses[0].skill_gaps, vec!["YARA"]);
    }

    #[test]
    fn gate_ignores_role_threshold() {
        // 1 of 2 skills 20 + knowledge 25 + mid task 16 + cert 10 + edu 5 = 76
        let c = candidate(ExperienceLevel::Mid, &["YARA"]);
        let mut strict = role(&["YARA", "Zeek"]);
        strict.threshold_score = 90.0;

        let synth = RecordSynthesizer::with_base_time(base(), 60.0);
        let mut ids = IdSequence::after_max(None, None, None, None);
        let mut rng = StdRng::seed_from_u64(21);
        let mut batch = SynthesizedBatch::default();
        let outcome = synth.synthesize(&c, &strict, &mut ids, &mut rng, &mut batch);

        assert_eq!(batch.analyses[0].ai_score, 76.0);
        assert_eq!(outcome, SynthesisOutcome::Eligible);
        assert_eq!(batch.tests.len(), 1);
        assert_eq!(batch.applications[0].status, ApplicationStatus::TestCompleted);

        let raised = RecordSynthesizer::with_base_time(base(), 80.0);
        let mut ids = IdSequence::after_max(None, None, None, None);
        let mut batch = SynthesizedBatch::default();
        let outcome = raised.synthesize(&c, &strict, &mut ids, &mut rng, &mut batch);

        assert_eq!(outcome, SynthesisOutcome::NotEligible);
        assert!(batch.tests.is_empty());
        assert_eq!(batch.applications[0].status, ApplicationStatus::NotEligible);
    }

    #[test]
    fn ids_increase_across_pairs_and_tests_skip_ineligible() {
        let synth = RecordSynthesizer::with_base_time(base(), 60.0);
        let mut ids = IdSequence::after_max(Some(9), Some(9), Some(9), Some(9));
        let mut rng = StdRng::seed_from_u64(5);
        let mut batch = SynthesizedBatch::default();

        let strong = candidate(ExperienceLevel::Senior, &["YARA"]);
        let weak = candidate(ExperienceLevel::Entry, &[]);
        let r = role(&["YARA"]);
        synth.synthesize(&strong, &r, &mut ids, &mut rng, &mut batch);
        synth.synthesize(&weak, &r, &mut ids, &mut rng, &mut batch);
        synth.synthesize(&strong, &r, &mut ids, &mut rng, &mut batch);

        let app_ids: Vec<_> = batch.applications.iter().map(|a| a.application_id).collect();
        assert_eq!(app_ids, vec![10, 11, 12]);
        let test_ids: Vec<_> = batch.tests.iter().map(|t| t.test_id).collect();
        assert_eq!(test_ids, vec![10, 11]);
        assert_eq!(batch.tests[1].application_id, 12);
        let decision_ids: Vec<_> = batch.decisions.iter().map(|d| d.decision_id).collect();
        assert_eq!(decision_ids, vec![10, 11, 12]);
    }

    #[test]
    fn base_time_is_one_to_thirty_days_back() {
        let now = base();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let synth = RecordSynthesizer::new(now, 60.0, &mut rng);
            let back = now - synth.base_time();
            assert!(back >= Duration::days(1) && back <= Duration::days(30));
        }
    }
}
