//! Worker configuration.

use std::str::FromStr;
use std::time::Duration;

use figures_generator::GenerationMode;
use figures_store::{DEFAULT_SAYINGS_COLLECTION, DEFAULT_SUBJECTS_COLLECTION};
use figures_text::DEFAULT_SIMILARITY_THRESHOLD;

use crate::accumulator::AccumulatorSettings;
use crate::error::{WorkerError, WorkerResult};

/// Which persistence backend the binary talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Firestore,
    /// Process-local; state is lost when the invocation exits.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(WorkerError::config_error(format!(
                "FIGURES_STORE must be firestore or memory, got '{}'",
                other
            ))),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long a claim stays valid
    pub lease_duration: Duration,
    /// Sayings needed before a subject is complete
    pub target: usize,
    /// Generator batches requested per accumulate call
    pub max_attempts: usize,
    /// Candidates requested per batch
    pub batch_size: usize,
    /// Edit distance at or below which a candidate is a near-duplicate
    pub similarity_threshold: usize,
    /// Length policy
    pub mode: GenerationMode,
    pub subjects_collection: String,
    pub sayings_collection: String,
    pub store_backend: StoreBackend,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(60 * 60),
            target: 30,
            max_attempts: 10,
            batch_size: 12,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            mode: GenerationMode::Short,
            subjects_collection: DEFAULT_SUBJECTS_COLLECTION.to_string(),
            sayings_collection: DEFAULT_SAYINGS_COLLECTION.to_string(),
            store_backend: StoreBackend::Firestore,
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let lock_minutes: u64 = env_parse("LOCK_MINUTES", 60);
        let lease_duration = lock_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| WorkerError::config_error("LOCK_MINUTES is too large"))?;

        let mode = match std::env::var("SAYINGS_MODE") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .parse()
                .map_err(|e| WorkerError::config_error(format!("SAYINGS_MODE: {}", e)))?,
            _ => defaults.mode,
        };

        let store_backend = match std::env::var("FIGURES_STORE") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => defaults.store_backend,
        };

        let config = Self {
            lease_duration,
            target: env_parse("SAYINGS_TARGET", defaults.target),
            max_attempts: env_parse("SAYINGS_MAX_ATTEMPTS", defaults.max_attempts),
            batch_size: env_parse("SAYINGS_BATCH_SIZE", defaults.batch_size),
            similarity_threshold: env_parse(
                "SAYINGS_SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            ),
            mode,
            subjects_collection: std::env::var("FIGURES_COLLECTION")
                .unwrap_or(defaults.subjects_collection),
            sayings_collection: std::env::var("SAYINGS_COLLECTION")
                .unwrap_or(defaults.sayings_collection),
            store_backend,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.lease_duration.is_zero() {
            return Err(WorkerError::config_error("LOCK_MINUTES must be positive"));
        }
        for (name, value) in [
            ("SAYINGS_TARGET", self.target),
            ("SAYINGS_MAX_ATTEMPTS", self.max_attempts),
            ("SAYINGS_BATCH_SIZE", self.batch_size),
        ] {
            if value == 0 {
                return Err(WorkerError::config_error(format!("{} must be positive", name)));
            }
        }
        if self.subjects_collection.trim().is_empty() || self.sayings_collection.trim().is_empty() {
            return Err(WorkerError::config_error("collection names must not be empty"));
        }
        Ok(())
    }

    pub fn accumulator_settings(&self) -> AccumulatorSettings {
        AccumulatorSettings {
            target: self.target,
            max_attempts: self.max_attempts,
            batch_size: self.batch_size,
            max_chars: self.mode.max_chars(),
            similarity_threshold: self.similarity_threshold,
        }
    }
}
