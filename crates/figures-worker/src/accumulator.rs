//! Saying accumulation for a claimed subject.
//!
//! One `accumulate` call loads the subject's existing sayings, asks the
//! generator for bounded batches of candidates, filters them through the
//! normalizer and similarity gate and appends the survivors until the target
//! is reached or the attempt budget runs out. Partial progress is persisted,
//! so a later call resumes where this one stopped.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use figures_generator::SayingGenerator;
use figures_models::{now_millis, AccumulateResponse, Saying, SequenceKey, SubjectId};
use figures_store::SayingStore;
use figures_text::{sanitize, CandidateText, SimilarityGate};

use crate::error::{WorkerError, WorkerResult};
use crate::lock_manager::SubjectLockManager;
use crate::metrics::{record_accumulation, record_candidate};

/// Bounds for one accumulate call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorSettings {
    /// Sayings needed before the subject is complete (`T`)
    pub target: usize,
    /// Generator batches per call (`A`)
    pub max_attempts: usize,
    /// Candidates requested per batch (`B`)
    pub batch_size: usize,
    /// Longest accepted display text, in characters
    pub max_chars: usize,
    pub similarity_threshold: usize,
}

impl Default for AccumulatorSettings {
    fn default() -> Self {
        Self {
            target: 30,
            max_attempts: 10,
            batch_size: 12,
            max_chars: 40,
            similarity_threshold: figures_text::DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Why a candidate was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Empty,
    TooLong,
    CanonicalEmpty,
    Duplicate,
    NearDuplicate,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Empty => "empty",
            Verdict::TooLong => "too_long",
            Verdict::CanonicalEmpty => "canonical_empty",
            Verdict::Duplicate => "duplicate",
            Verdict::NearDuplicate => "near_duplicate",
        }
    }
}

/// In-memory view of everything accepted for one subject so far.
struct AcceptedSet {
    fingerprints: HashSet<String>,
    canonicals: Vec<String>,
    gate: SimilarityGate,
}

impl AcceptedSet {
    fn new(similarity_threshold: usize) -> Self {
        Self {
            fingerprints: HashSet::new(),
            canonicals: Vec::new(),
            gate: SimilarityGate::new(similarity_threshold),
        }
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }

    /// Trust a stored saying. Returns false if it adds nothing new.
    fn restore(&mut self, candidate: CandidateText) -> bool {
        if !self.fingerprints.insert(candidate.fingerprint) {
            return false;
        }
        self.canonicals.push(candidate.canonical);
        true
    }

    fn judge(&mut self, raw: &str, max_chars: usize) -> (Verdict, Option<CandidateText>) {
        let text = sanitize(raw);
        if text.is_empty() {
            return (Verdict::Empty, None);
        }
        if text.chars().count() > max_chars {
            return (Verdict::TooLong, None);
        }
        let Some(candidate) = CandidateText::from_sanitized(text) else {
            return (Verdict::CanonicalEmpty, None);
        };
        if self.fingerprints.contains(&candidate.fingerprint) {
            return (Verdict::Duplicate, None);
        }
        if self
            .gate
            .is_near_duplicate(&candidate.canonical, self.canonicals.iter().map(String::as_str))
        {
            return (Verdict::NearDuplicate, None);
        }
        (Verdict::Accepted, Some(candidate))
    }
}

/// Next key after the stored sayings: one past the highest parsed key, and
/// never below `count + 1` so malformed keys cannot cause a collision.
pub fn next_sequence_key(existing: &[Saying]) -> SequenceKey {
    let by_count = SequenceKey(existing.len() as u64 + 1);
    existing
        .iter()
        .filter_map(Saying::parsed_key)
        .max()
        .map(|highest| highest.next().max(by_count))
        .unwrap_or(by_count)
}

pub struct SayingAccumulator {
    sayings: Arc<dyn SayingStore>,
    generator: Arc<dyn SayingGenerator>,
    locks: SubjectLockManager,
    settings: AccumulatorSettings,
}

impl SayingAccumulator {
    pub fn new(
        sayings: Arc<dyn SayingStore>,
        generator: Arc<dyn SayingGenerator>,
        locks: SubjectLockManager,
        settings: AccumulatorSettings,
    ) -> Self {
        Self {
            sayings,
            generator,
            locks,
            settings,
        }
    }

    /// Bring the subject's saying set up to the target.
    ///
    /// Generator and store failures abort the call; already-appended sayings
    /// stay in place and the lease is left for the expiry sweep.
    pub async fn accumulate(
        &self,
        subject_id: &SubjectId,
        display_name: &str,
    ) -> WorkerResult<AccumulateResponse> {
        if subject_id.is_empty() {
            return Err(WorkerError::invalid_input("subjectId is required"));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(WorkerError::invalid_input("displayName is required"));
        }

        let settings = self.settings;
        let existing = self.sayings.load_all(subject_id).await?;

        let mut accepted = AcceptedSet::new(settings.similarity_threshold);
        for saying in &existing {
            let restored = CandidateText::from_sanitized(sanitize(&saying.text))
                .map(|candidate| accepted.restore(candidate))
                .unwrap_or(false);
            if !restored {
                warn!(
                    subject_id = %subject_id,
                    sequence_key = %saying.sequence_key,
                    "Stored saying does not add a distinct canonical form"
                );
            }
        }

        info!(
            subject_id = %subject_id,
            stored = existing.len(),
            accepted = accepted.len(),
            target = settings.target,
            "Loaded existing sayings"
        );

        if accepted.len() >= settings.target {
            self.locks.mark_completed(subject_id).await?;
            record_accumulation("completed");
            return Ok(AccumulateResponse::completed(accepted.len()));
        }

        let mut next_key = next_sequence_key(&existing);
        let mut attempt = 0;
        while accepted.len() < settings.target && attempt < settings.max_attempts {
            attempt += 1;
            let batch = self
                .generator
                .generate(display_name, settings.batch_size)
                .await?;
            debug!(
                subject_id = %subject_id,
                attempt,
                candidates = batch.len(),
                "Received candidate batch"
            );

            // A generator may overshoot the request; at most B are persisted.
            for raw in batch.iter().take(settings.batch_size) {
                let (verdict, candidate) = accepted.judge(raw, settings.max_chars);
                record_candidate(verdict.label());
                let Some(candidate) = candidate else {
                    debug!(subject_id = %subject_id, verdict = verdict.label(), "Rejected candidate");
                    continue;
                };

                let saying = Saying::new(
                    subject_id.clone(),
                    next_key,
                    candidate.text.clone(),
                    candidate.fingerprint.clone(),
                    now_millis(),
                )
                .with_display_name(display_name);
                self.sayings.append(&saying).await?;

                next_key = next_key.next();
                accepted.restore(candidate);

                if accepted.len() >= settings.target {
                    break;
                }
            }

            info!(
                subject_id = %subject_id,
                attempt,
                accepted = accepted.len(),
                target = settings.target,
                distance_pairs = accepted.gate.cached_pairs(),
                "Finished batch"
            );
        }

        if accepted.len() >= settings.target {
            self.locks.mark_completed(subject_id).await?;
            record_accumulation("completed");
            Ok(AccumulateResponse::completed(accepted.len()))
        } else {
            info!(
                subject_id = %subject_id,
                accepted = accepted.len(),
                target = settings.target,
                attempts = attempt,
                "Attempts exhausted, leaving subject locked"
            );
            record_accumulation("partial");
            Ok(AccumulateResponse::partial(accepted.len(), settings.target))
        }
    }
}
