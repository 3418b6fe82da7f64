//! Worker metrics.

use metrics::counter;

pub mod names {
    /// Claim attempts by outcome (claimed, none_available, conflict).
    pub const CLAIMS_TOTAL: &str = "figures_worker_claims_total";

    /// Generated candidates by filter verdict.
    pub const CANDIDATES_TOTAL: &str = "figures_worker_candidates_total";

    /// Expired-lease sweep results by outcome (released, skipped).
    pub const RELEASES_TOTAL: &str = "figures_worker_releases_total";

    /// Accumulate invocations by terminal status.
    pub const ACCUMULATIONS_TOTAL: &str = "figures_worker_accumulations_total";
}

pub fn record_claim(outcome: &'static str) {
    counter!(names::CLAIMS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_candidate(verdict: &'static str) {
    counter!(names::CANDIDATES_TOTAL, "verdict" => verdict).increment(1);
}

pub fn record_release(outcome: &'static str, count: usize) {
    counter!(names::RELEASES_TOTAL, "outcome" => outcome).increment(count as u64);
}

pub fn record_accumulation(status: &'static str) {
    counter!(names::ACCUMULATIONS_TOTAL, "status" => status).increment(1);
}
