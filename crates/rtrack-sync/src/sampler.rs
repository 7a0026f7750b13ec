use rand::seq::SliceRandom;
use rand::Rng;
use rtrack_core::{Candidate, JobRole};

pub const DEFAULT_SAMPLE_SIZE: usize = 200;

/// Pick up to `sample_size` distinct candidates.
pub fn sample_candidates<'a, R: Rng + ?Sized>(
    candidates: &'a [Candidate],
    sample_size: usize,
    rng: &mut R,
) -> Vec<&'a Candidate> {
    candidates
        .choose_multiple(rng, sample_size.min(candidates.len()))
        .collect()
}

/// Choose one role the candidate has not applied to yet, if any remain.
pub fn pick_job_role<'a, R: Rng + ?Sized>(
    candidate: &Candidate,
    roles: &'a [JobRole],
    rng: &mut R,
) -> Option<&'a JobRole> {
    let available: Vec<&JobRole> = roles
        .iter()
        .filter(|role| !candidate.has_applied_to(role.role_id))
        .collect();
    available.choose(rng).copied()
}
