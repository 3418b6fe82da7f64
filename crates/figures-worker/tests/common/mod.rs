//! Shared fixtures for worker integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use figures_generator::{GeneratorError, GeneratorResult, SayingGenerator};
use figures_models::{Saying, SequenceKey, Subject, SubjectId, SubjectStatus};
use figures_store::{InMemoryStore, SayingStore};
use figures_text::CandidateText;
use figures_worker::{AccumulatorSettings, SayingAccumulator, SubjectLockManager};

pub const LEASE: Duration = Duration::from_secs(3600);

/// Plays back a fixed sequence of batches, then returns empty batches.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<GeneratorResult<Vec<String>>>>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedGenerator {
    pub fn new(batches: Vec<Vec<&str>>) -> Self {
        let script = batches
            .into_iter()
            .map(|batch| Ok(batch.into_iter().map(str::to_string).collect()))
            .collect();
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Repeat the same batch for every call.
    pub fn repeating(batch: Vec<&str>, times: usize) -> Self {
        Self::new(std::iter::repeat(batch).take(times).collect())
    }

    pub async fn push_failure(&self, error: GeneratorError) {
        self.script.lock().await.push_back(Err(error));
    }

    pub async fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl SayingGenerator for ScriptedGenerator {
    async fn generate(&self, display_name: &str, batch_size: usize) -> GeneratorResult<Vec<String>> {
        self.calls
            .lock()
            .await
            .push((display_name.to_string(), batch_size));
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn subject(ordinal: u32, status: SubjectStatus) -> Subject {
    Subject::new(
        SubjectId::from_ordinal(ordinal),
        format!("figure {}", ordinal),
        status,
        0,
    )
}

pub fn locked_subject(ordinal: u32, locked_until: i64) -> Subject {
    let mut s = subject(ordinal, SubjectStatus::Locked);
    s.locked_until = Some(locked_until);
    s
}

/// Store the given texts as sayings with consecutive keys starting at 1.
pub async fn store_sayings(store: &InMemoryStore, id: &SubjectId, texts: &[String]) {
    let mut key = SequenceKey::FIRST;
    for text in texts {
        let fingerprint = CandidateText::from_sanitized(text.as_str())
            .map(|c| c.fingerprint)
            .unwrap_or_default();
        store
            .append(&Saying::new(id.clone(), key, text.as_str(), fingerprint, 0))
            .await
            .unwrap();
        key = key.next();
    }
}

/// `count` texts that are pairwise far apart under the similarity gate.
pub fn distinct_texts(count: usize) -> Vec<String> {
    (0..count as u32)
        .map(|i| {
            let c = char::from_u32(0x4E00 + i * 7).unwrap();
            std::iter::repeat(c).take(6).collect()
        })
        .collect()
}

pub fn accumulator(
    store: Arc<InMemoryStore>,
    generator: Arc<ScriptedGenerator>,
    settings: AccumulatorSettings,
) -> SayingAccumulator {
    let locks = SubjectLockManager::new(store.clone(), LEASE);
    SayingAccumulator::new(store, generator, locks, settings)
}
