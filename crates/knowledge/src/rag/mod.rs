//! Retrieval-augmented answering.
//!
//! [`AnswerSynthesizer`] turns retrieved chunks into a grounded answer;
//! `types` holds the request, citation and outcome types shared with callers.

pub mod synthesizer;
pub mod types;

pub use synthesizer::{AnswerSynthesizer, LOW_CONFIDENCE_REFUSAL, NOT_FOUND_SENTENCE};
pub use types::{Answer, AnswerMetadata, AnswerOutcome, Citation, Degradation, QueryRequest};
