use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{MarkovError, Result};
use super::state_indexer::{state_count, END_CHAR, START_CHAR};

/// Largest state space a model may have.
///
/// Row offsets are stored for every state, so the space itself must fit in
/// memory even when few transitions are observed. 26 letters reach it past memory 5.
pub const MAX_STATE_COUNT: usize = 1 << 24;

/// What to do with a corpus entry containing a symbol outside the alphabet.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InvalidSymbolPolicy {
	/// Abort the build with `MarkovError::InvalidSymbol`.
	Reject,
	/// Leave the entry out of the counts and log a warning.
	#[default]
	Skip,
}

/// Construction parameters of a `MarkovModel`.
///
/// # Responsibilities
/// - Carry the alphabet, the memory depth and the walk length bound
/// - Carry the corpus ingestion options (case folding, invalid symbol policy)
/// - Fail fast on any combination that cannot produce a valid state space
///
/// # Invariants (after `validate`)
/// - `memory >= 1`, `max_length >= 1`
/// - `alphabet` is non-empty, without duplicates and without delimiters
/// - The state count `2 + Σ A^k` is at most `MAX_STATE_COUNT`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelConfig {
	/// Ordered symbols; the order fixes the state id assignment.
	pub alphabet: Vec<char>,

	/// N-gram length used as Markov state (1 = letter to letter chain).
	pub memory: usize,

	/// Maximum number of states in a walk, START included.
	pub max_length: usize,

	/// Lowercase corpus entries before ingestion.
	pub fold_case: bool,

	pub invalid_symbol_policy: InvalidSymbolPolicy,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			alphabet: ('a'..='z').collect(),
			memory: 2,
			max_length: 12,
			fold_case: true,
			invalid_symbol_policy: InvalidSymbolPolicy::Skip,
		}
	}
}

impl ModelConfig {
	/// Creates a configuration with the default ingestion options.
	pub fn new(alphabet: impl IntoIterator<Item = char>, memory: usize, max_length: usize) -> Self {
		Self {
			alphabet: alphabet.into_iter().collect(),
			memory,
			max_length,
			..Self::default()
		}
	}

	/// Replaces the alphabet with the sorted distinct symbols found in `corpus`.
	///
	/// Case folding is applied first when enabled, so the derived alphabet
	/// matches what the model will actually ingest.
	pub fn with_corpus_alphabet<S: AsRef<str>>(mut self, corpus: &[S]) -> Self {
		let symbols: BTreeSet<char> = corpus
			.iter()
			.flat_map(|entry| {
				let entry = entry.as_ref();
				let entry = if self.fold_case { entry.to_lowercase() } else { entry.to_owned() };
				entry.chars().collect::<Vec<_>>()
			})
			.filter(|c| *c != START_CHAR && *c != END_CHAR)
			.collect();
		self.alphabet = symbols.into_iter().collect();
		self
	}

	/// Number of states (`2 + Σ_{k=1..M} A^k`) of the configured space.
	///
	/// # Errors
	/// Returns `MarkovError::Config` if the configuration is invalid.
	pub fn state_count(&self) -> Result<usize> {
		self.validate()?;
		state_count(self.alphabet.len(), self.memory)
			.ok_or_else(|| MarkovError::Config("State space overflows usize".to_owned()))
	}

	/// Checks every construction invariant.
	///
	/// # Errors
	/// Returns `MarkovError::Config` describing the first violated invariant.
	pub fn validate(&self) -> Result<()> {
		if self.memory == 0 {
			return Err(MarkovError::Config("memory must be >= 1".to_owned()));
		}
		if self.max_length == 0 {
			return Err(MarkovError::Config("max_length must be >= 1".to_owned()));
		}
		if self.alphabet.is_empty() {
			return Err(MarkovError::Config("alphabet must not be empty".to_owned()));
		}
		if let Some(c) = self.alphabet.iter().find(|c| **c == START_CHAR || **c == END_CHAR) {
			return Err(MarkovError::Config(format!("alphabet must not contain delimiter {c:?}")));
		}
		let mut seen = HashSet::with_capacity(self.alphabet.len());
		if let Some(c) = self.alphabet.iter().find(|c| !seen.insert(**c)) {
			return Err(MarkovError::Config(format!("alphabet contains {c:?} twice")));
		}
		match state_count(self.alphabet.len(), self.memory) {
			Some(count) if count <= MAX_STATE_COUNT => {}
			_ => {
				return Err(MarkovError::Config(format!(
					"state space of {} symbols at memory {} exceeds {MAX_STATE_COUNT} states",
					self.alphabet.len(),
					self.memory
				)));
			}
		}
		Ok(())
	}
}
