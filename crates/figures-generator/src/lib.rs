//! Candidate saying generation.
//!
//! `SayingGenerator` is the seam the accumulator calls; `GeminiSayingGenerator`
//! is the production implementation.

pub mod error;
pub mod gemini;
pub mod generator;

pub use error::{GeneratorError, GeneratorResult};
pub use gemini::{parse_sayings, GeminiConfig, GeminiSayingGenerator};
pub use generator::{GenerationMode, SayingGenerator};
