//! The generator collaborator seam.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{GeneratorError, GeneratorResult};

/// Produces batches of raw candidate sayings for a subject.
///
/// One call is one attempt: implementations must not retry internally. The
/// accumulator owns the retry budget by asking for fresh batches.
#[async_trait]
pub trait SayingGenerator: Send + Sync {
    async fn generate(&self, display_name: &str, batch_size: usize) -> GeneratorResult<Vec<String>>;
}

/// Length policy for generated sayings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// Up to 40 characters, one line on screen.
    #[default]
    Short,
    /// Up to 80 characters.
    Long,
}

impl GenerationMode {
    /// Maximum accepted length in characters after sanitizing.
    pub fn max_chars(&self) -> usize {
        match self {
            GenerationMode::Short => 40,
            GenerationMode::Long => 80,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Short => "short",
            GenerationMode::Long => "long",
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMode {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(GenerationMode::Short),
            "long" => Ok(GenerationMode::Long),
            other => Err(GeneratorError::config(format!(
                "unknown generation mode '{}' (expected short or long)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_limits() {
        assert_eq!(GenerationMode::Short.max_chars(), 40);
        assert_eq!(GenerationMode::Long.max_chars(), 80);
        assert_eq!(GenerationMode::default(), GenerationMode::Short);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("LONG".parse::<GenerationMode>().unwrap(), GenerationMode::Long);
        assert_eq!(" short ".parse::<GenerationMode>().unwrap(), GenerationMode::Short);
        assert!("medium".parse::<GenerationMode>().is_err());
    }
}
