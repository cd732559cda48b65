use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{MarkovError, Result};
use super::config::{InvalidSymbolPolicy, ModelConfig};
use super::state_indexer::{StateIndexer, END};

/// Raw transition counts gathered from a corpus.
///
/// Counting is split from normalization so partial counts built on separate
/// threads can be merged exactly (integer sums) before a single normalization.
///
/// # Invariants
/// - Every stored count is strictly positive
/// - Every source and destination id is `< state_count`
#[derive(Clone, Debug, Default)]
pub struct TransitionCounts {
	state_count: usize,
	counts: HashMap<(usize, usize), u64>,
	/// Number of corpus entries that contributed.
	words: usize,
}

impl TransitionCounts {
	/// Creates empty counts for a space of `state_count` states.
	pub fn new(state_count: usize) -> Self {
		Self { state_count, counts: HashMap::new(), words: 0 }
	}

	pub fn words(&self) -> usize {
		self.words
	}

	/// Count of the transition `from → to`.
	pub fn count(&self, from: usize, to: usize) -> u64 {
		self.counts.get(&(from, to)).copied().unwrap_or(0)
	}

	/// Records every adjacent pair of an observation sequence.
	pub fn add_sequence(&mut self, sequence: &[usize]) {
		for pair in sequence.windows(2) {
			*self.counts.entry((pair[0], pair[1])).or_insert(0) += 1;
		}
		self.words += 1;
	}

	/// Adds one corpus entry.
	///
	/// - Lowercases the entry first if the configuration folds case
	/// - Ignores empty entries (they would only teach START → END)
	///
	/// # Errors
	/// Returns `InvalidSymbol` when the entry contains a foreign symbol and the
	/// policy is `Reject`. With `Skip`, the entry is logged and left out.
	pub fn add_word(&mut self, word: &str, indexer: &StateIndexer, config: &ModelConfig) -> Result<()> {
		let chars: Vec<char> = if config.fold_case {
			word.chars().flat_map(char::to_lowercase).collect()
		} else {
			word.chars().collect()
		};
		if chars.is_empty() {
			debug!("Ignoring empty corpus entry");
			return Ok(());
		}

		match indexer.observation_sequence(&chars) {
			Ok(sequence) => {
				self.add_sequence(&sequence);
				Ok(())
			}
			Err(MarkovError::InvalidSymbol { symbol }) if config.invalid_symbol_policy == InvalidSymbolPolicy::Skip => {
				warn!("Skipping corpus entry {word:?}: symbol {symbol:?} is not in the alphabet");
				Ok(())
			}
			Err(e) => Err(e),
		}
	}

	/// Counts a whole corpus on the current thread.
	pub fn from_corpus<S: AsRef<str>>(corpus: &[S], indexer: &StateIndexer, config: &ModelConfig) -> Result<Self> {
		let mut counts = Self::new(indexer.state_count());
		for word in corpus {
			counts.add_word(word.as_ref(), indexer, config)?;
		}
		Ok(counts)
	}

	/// Counts a corpus split in chunks across threads, then merges the partial counts.
	///
	/// - Splits the corpus into `cpus * 8` chunks
	/// - Each thread counts its chunk into its own `TransitionCounts`
	/// - Partial counts are collected through an MPSC channel and merged
	///
	/// The result is identical to `from_corpus`: counts are integers, merge order
	/// does not matter.
	pub fn from_corpus_parallel<S>(corpus: &[S], indexer: &StateIndexer, config: &ModelConfig) -> Result<Self>
	where
		S: AsRef<str> + Sync,
	{
		if corpus.is_empty() {
			return Ok(Self::new(indexer.state_count()));
		}

		let chunks = num_cpus::get() * 8;
		let chunk_size = corpus.len().div_ceil(chunks);

		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for chunk in corpus.chunks(chunk_size) {
				let tx = tx.clone();
				scope.spawn(move || {
					// The receiver outlives the scope, sending cannot fail
					let _ = tx.send(Self::from_corpus(chunk, indexer, config));
				});
			}
		});
		drop(tx);

		let mut total = Self::new(indexer.state_count());
		for partial in rx.iter() {
			total.merge(&partial?)?;
		}
		Ok(total)
	}

	/// Merges another set of counts into this one.
	///
	/// # Errors
	/// Returns an error if both counts do not describe the same state space.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.state_count != other.state_count {
			return Err(MarkovError::Config(format!(
				"State count mismatch: {} != {}",
				self.state_count, other.state_count
			)));
		}
		for (pair, count) in &other.counts {
			*self.counts.entry(*pair).or_insert(0) += *count;
		}
		self.words += other.words;
		Ok(())
	}
}

/// Row-stochastic transition matrix over the state space, stored row by row
/// (compressed sparse rows: only observed transitions are kept).
///
/// `T[i][j]` is the observed frequency of `i → j` divided by the number of
/// transitions leaving `i`.
///
/// # Invariants
/// - Rows with observations sum to 1, unobserved rows are empty (all zero)
/// - END's row is the identity: END only transitions to itself
/// - Columns are strictly increasing inside a row
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TransitionMatrix {
	state_count: usize,
	/// Row `i` spans `row_offsets[i]..row_offsets[i + 1]` of `columns` / `probabilities`.
	row_offsets: Vec<usize>,
	columns: Vec<usize>,
	probabilities: Vec<f64>,
}

impl TransitionMatrix {
	/// Counts and normalizes a corpus (single-threaded).
	pub fn build<S: AsRef<str>>(corpus: &[S], indexer: &StateIndexer, config: &ModelConfig) -> Result<Self> {
		let counts = TransitionCounts::from_corpus(corpus, indexer, config)?;
		Ok(Self::from_counts(&counts))
	}

	/// Counts a corpus on every core and normalizes the merged counts.
	pub fn build_parallel<S>(corpus: &[S], indexer: &StateIndexer, config: &ModelConfig) -> Result<Self>
	where
		S: AsRef<str> + Sync,
	{
		let counts = TransitionCounts::from_corpus_parallel(corpus, indexer, config)?;
		info!("Counted {} words into {} distinct transitions", counts.words, counts.counts.len());
		Ok(Self::from_counts(&counts))
	}

	/// Normalizes raw counts into probabilities.
	///
	/// Entries are sorted by `(row, column)` first, so the result does not depend
	/// on the hash map iteration order.
	pub fn from_counts(counts: &TransitionCounts) -> Self {
		let mut entries: Vec<((usize, usize), u64)> = counts
			.counts
			.iter()
			.filter(|((from, _), count)| *from != END && **count > 0)
			.map(|(pair, count)| (*pair, *count))
			.collect();
		// Absorbing END
		entries.push(((END, END), 1));
		entries.sort_unstable_by_key(|(pair, _)| *pair);

		let state_count = counts.state_count.max(END + 1);
		let mut row_offsets = Vec::with_capacity(state_count + 1);
		let mut columns = Vec::with_capacity(entries.len());
		let mut probabilities = Vec::with_capacity(entries.len());

		let mut start = 0;
		for row in 0..state_count {
			row_offsets.push(columns.len());
			let end = start + entries[start..].partition_point(|((from, _), _)| *from == row);
			let total: u64 = entries[start..end].iter().map(|(_, count)| count).sum();
			for ((_, to), count) in &entries[start..end] {
				columns.push(*to);
				probabilities.push(*count as f64 / total as f64);
			}
			start = end;
		}
		row_offsets.push(columns.len());

		Self { state_count, row_offsets, columns, probabilities }
	}

	pub fn state_count(&self) -> usize {
		self.state_count
	}

	/// Number of stored (non-zero) transitions.
	pub fn nonzero_count(&self) -> usize {
		self.columns.len()
	}

	/// Non-zero entries `(column, probability)` of row `from`, by increasing column.
	pub fn row(&self, from: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
		let span = self.span(from);
		self.columns[span.clone()].iter().copied().zip(self.probabilities[span].iter().copied())
	}

	/// `T[from][to]`; 0 for unobserved transitions and out-of-range ids.
	pub fn probability(&self, from: usize, to: usize) -> f64 {
		let span = self.span(from);
		match self.columns[span.clone()].binary_search(&to) {
			Ok(i) => self.probabilities[span.start + i],
			Err(_) => 0.0,
		}
	}

	/// Sum of row `from`: 1 for observed states, 0 otherwise.
	pub fn row_sum(&self, from: usize) -> f64 {
		self.row(from).map(|(_, p)| p).sum()
	}

	/// True when the state never had an outgoing observation.
	pub fn is_empty_row(&self, from: usize) -> bool {
		self.span(from).is_empty()
	}

	/// Dense `N × N` copy, for small state spaces (inspection, heatmaps).
	pub fn to_dense(&self) -> Vec<Vec<f64>> {
		(0..self.state_count)
			.map(|from| {
				let mut row = vec![0.0; self.state_count];
				for (to, p) in self.row(from) {
					row[to] = p;
				}
				row
			})
			.collect()
	}

	/// Row-wise cumulative sums, used for inverse-CDF sampling.
	pub fn cumulative(&self) -> CumulativeMatrix {
		let mut cumulative = Vec::with_capacity(self.probabilities.len());
		for from in 0..self.state_count {
			let mut sum = 0.0;
			for p in &self.probabilities[self.span(from)] {
				sum += p;
				cumulative.push(sum);
			}
		}

		CumulativeMatrix {
			state_count: self.state_count,
			row_offsets: self.row_offsets.clone(),
			columns: self.columns.clone(),
			cumulative,
		}
	}

	/// Checks the internal layout, used after deserialization.
	///
	/// # Errors
	/// Returns `MarkovError::Config` if the matrix does not describe `state_count`
	/// states or its rows are malformed.
	pub fn check_layout(&self, state_count: usize) -> Result<()> {
		let malformed = |reason: &str| Err(MarkovError::Config(format!("Malformed transition matrix: {reason}")));

		if self.state_count != state_count || self.row_offsets.len() != state_count + 1 {
			return malformed("state count mismatch");
		}
		if self.columns.len() != self.probabilities.len() || self.row_offsets.last() != Some(&self.columns.len()) {
			return malformed("inconsistent lengths");
		}
		if self.row_offsets.first() != Some(&0) || self.row_offsets.windows(2).any(|w| w[0] > w[1]) {
			return malformed("row offsets are not increasing");
		}
		for from in 0..state_count {
			let columns = &self.columns[self.span(from)];
			if columns.windows(2).any(|w| w[0] >= w[1]) || columns.iter().any(|c| *c >= state_count) {
				return malformed("invalid columns");
			}
		}
		if self.probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
			return malformed("negative or non finite probability");
		}
		Ok(())
	}

	fn span(&self, from: usize) -> std::ops::Range<usize> {
		match (self.row_offsets.get(from), self.row_offsets.get(from + 1)) {
			(Some(start), Some(end)) => *start..*end,
			_ => 0..0,
		}
	}
}

/// Row-wise cumulative form of a `TransitionMatrix`: `C[i][j] = Σ_{k<=j} T[i][k]`.
///
/// Shares the sparse layout of its matrix. Read-only, it can be shared between
/// any number of concurrent samplers.
#[derive(Clone, Debug)]
pub struct CumulativeMatrix {
	state_count: usize,
	row_offsets: Vec<usize>,
	columns: Vec<usize>,
	cumulative: Vec<f64>,
}

impl CumulativeMatrix {
	pub fn state_count(&self) -> usize {
		self.state_count
	}

	/// `C[from][to]`.
	pub fn value(&self, from: usize, to: usize) -> f64 {
		let (columns, cumulative) = self.row(from);
		match columns.partition_point(|column| *column <= to) {
			0 => 0.0,
			i => cumulative[i - 1],
		}
	}

	/// Inverse-CDF step: the first column whose cumulative value reaches `u`.
	///
	/// - `u` is expected in `[0, 1)`
	/// - An empty row (never observed state) goes to END
	/// - If rounding leaves the row total just below `u`, the last column is taken
	#[inline]
	pub fn next_state(&self, from: usize, u: f64) -> usize {
		let (columns, cumulative) = self.row(from);
		if columns.is_empty() {
			return END;
		}
		let i = cumulative.partition_point(|c| *c < u);
		columns[i.min(columns.len() - 1)]
	}

	#[inline]
	fn row(&self, from: usize) -> (&[usize], &[f64]) {
		match (self.row_offsets.get(from), self.row_offsets.get(from + 1)) {
			(Some(start), Some(end)) => (&self.columns[*start..*end], &self.cumulative[*start..*end]),
			_ => (&self.columns[..0], &self.cumulative[..0]),
		}
	}
}
