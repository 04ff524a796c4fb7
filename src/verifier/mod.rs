pub mod runner;

pub use runner::{normalize_output, VerifierError, VerifierOutcome, VerifierResult, VerifierRunner};
