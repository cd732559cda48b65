use thiserror::Error;

/// Errors raised while configuring, training, persisting or sampling a Markov model.
///
/// All failures are local and synchronous: there is no I/O in the core besides
/// corpus reading and model persistence, so nothing here is worth retrying.
#[derive(Error, Debug)]
pub enum MarkovError {
	/// A character outside the configured alphabet was given to the indexer.
	#[error("Symbol {symbol:?} is not part of the alphabet")]
	InvalidSymbol { symbol: char },

	/// An n-gram length outside `1..=memory` was given to the indexer.
	#[error("N-gram length {length} is outside 1..={memory}")]
	InvalidLength { length: usize, memory: usize },

	/// Invalid model configuration (memory, alphabet, max length...).
	#[error("Invalid configuration: {0}")]
	Config(String),

	/// No model registered under this name.
	#[error("Model {0} not found")]
	ModelNotFound(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] postcard::Error),
}

/// Result type for every fallible operation of the crate.
pub type Result<T> = std::result::Result<T, MarkovError>;
