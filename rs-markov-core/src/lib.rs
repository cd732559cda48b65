//! N-gram Markov chain text generation library.
//!
//! This crate provides:
//! - A dense, collision-free state indexing of n-grams up to a memory depth
//! - Row-stochastic transition matrices built from a corpus of strings
//! - Single-walk and batched (vectorized) sampling of new strings
//! - Corpus loading and model persistence
//!
//! Data flow: corpus → `StateIndexer` → `TransitionMatrix` → `ChainSampler`
//! → recovered strings.

/// Error type shared by the whole crate.
pub mod error;

/// Markov chain models and generation logic.
pub mod model;

/// I/O utilities (corpus loading, path helpers).
mod io;

pub use error::{MarkovError, Result};
pub use io::read_corpus;
pub use model::config::{InvalidSymbolPolicy, ModelConfig};
pub use model::generator::Generator;
pub use model::markov_model::MarkovModel;
pub use model::sampler::{ChainSampler, WalkBatch};
pub use model::state_indexer::{StateIndexer, END, END_CHAR, START, START_CHAR};
pub use model::transition_model::{CumulativeMatrix, TransitionCounts, TransitionMatrix};
