//! Text normalization and near-duplicate detection for generated sayings.
//!
//! This crate provides:
//! - `sanitize`: bracket stripping and whitespace collapsing for display text
//! - `canonicalize`: the comparison form used as the dedup key space
//! - `fingerprint`: SHA-256 of the canonical form for exact-duplicate lookup
//! - `SimilarityGate`: edit-distance rejection of near-paraphrases

pub mod normalize;
pub mod similarity;

pub use normalize::{canonicalize, fingerprint, sanitize, CandidateText};
pub use similarity::{edit_distance, is_near_duplicate, SimilarityGate, DEFAULT_SIMILARITY_THRESHOLD};
