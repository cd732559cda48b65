use std::thread;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{MarkovError, Result};
use super::state_indexer::{StateIndexer, END, START};
use super::transition_model::CumulativeMatrix;

/// Largest number of state ids a single `WalkBatch` may hold (256 MiB of `usize` on 64-bit).
pub const MAX_BATCH_STATES: usize = 1 << 25;

/// Initial capacity of a single walk; longer walks grow the vector.
const WALK_CAPACITY: usize = 32;

/// Random walks over a Markov chain, from START to END or a length bound.
///
/// # Responsibilities
/// - Draw a single walk step by step (`sample_one`)
/// - Draw many independent walks one step at a time for all of them (`sample_many`)
/// - Spread independent walks over threads (`sample_many_parallel`)
///
/// Every step uses the same inverse-CDF rule (`CumulativeMatrix::next_state`),
/// so all three produce the same distribution of walks.
#[derive(Clone, Copy, Debug)]
pub struct ChainSampler<'a> {
	cumulative: &'a CumulativeMatrix,
	max_length: usize,
}

impl<'a> ChainSampler<'a> {
	/// Creates a sampler producing walks of at most `max_length` states (START included).
	///
	/// # Errors
	/// Returns `MarkovError::Config` if `max_length` is 0.
	pub fn new(cumulative: &'a CumulativeMatrix, max_length: usize) -> Result<Self> {
		if max_length == 0 {
			return Err(MarkovError::Config("max_length must be >= 1".to_owned()));
		}
		Ok(Self { cumulative, max_length })
	}

	pub fn max_length(&self) -> usize {
		self.max_length
	}

	/// Draws one walk.
	///
	/// Stops right after END, or silently once `max_length` states are emitted
	/// (END is then absent).
	pub fn sample_one<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
		let mut walk = Vec::with_capacity(self.max_length.min(WALK_CAPACITY));
		walk.push(START);

		let mut state = START;
		while walk.len() < self.max_length {
			state = self.cumulative.next_state(state, rng.random());
			walk.push(state);
			if state == END {
				break;
			}
		}
		walk
	}

	/// Draws `count` independent walks at once.
	///
	/// The batch is pre-filled with END and column 0 is START. Step `t` then
	/// draws `count` uniform values and performs `count` row lookups in one pass.
	/// A finished walk keeps stepping END → END (END's row is absorbing), so no
	/// walk needs an early exit.
	///
	/// # Errors
	/// Returns `MarkovError::Config` if `count × max_length` does not fit in memory.
	pub fn sample_many<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<WalkBatch> {
		let width = self.max_length;
		let mut batch = WalkBatch::filled(count, width)?;

		let mut current = vec![START; count];
		let mut draws = vec![0.0_f64; count];
		for t in 1..width {
			for u in draws.iter_mut() {
				*u = rng.random();
			}
			for (w, (state, u)) in current.iter_mut().zip(&draws).enumerate() {
				*state = self.cumulative.next_state(*state, *u);
				batch.states[w * width + t] = *state;
			}
		}
		Ok(batch)
	}

	/// Draws `count` walks split across threads.
	///
	/// Each thread runs `sample_many` on its share with its own `StdRng`, whose
	/// seed is drawn from a generator seeded with `seed`. Results are concatenated
	/// in thread order: the output only depends on `seed` and the number of CPUs.
	///
	/// # Errors
	/// Same as `sample_many`.
	pub fn sample_many_parallel(&self, count: usize, seed: u64) -> Result<WalkBatch> {
		WalkBatch::check_size(count, self.max_length)?;
		let threads = num_cpus::get().clamp(1, count.max(1));
		let share = count.div_ceil(threads);
		let mut master = StdRng::seed_from_u64(seed);

		let jobs: Vec<(usize, u64)> = (0..threads)
			.map(|i| (share.min(count.saturating_sub(i * share)), master.random()))
			.filter(|(n, _)| *n > 0)
			.collect();
		debug!("Sampling {count} walks on {} threads", jobs.len());

		let parts: Vec<Result<WalkBatch>> = thread::scope(|scope| {
			let handles: Vec<_> = jobs
				.into_iter()
				.map(|(n, seed)| {
					let sampler = *self;
					scope.spawn(move || sampler.sample_many(n, &mut StdRng::seed_from_u64(seed)))
				})
				.collect();
			handles
				.into_iter()
				.map(|handle| handle.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
				.collect()
		});

		WalkBatch::concat(parts.into_iter().collect::<Result<Vec<_>>>()?, self.max_length)
	}
}

/// Fixed-width array of walks: `count` rows of `width` state ids.
///
/// Row `i` holds walk `i` followed by END padding; a truncated walk has no END.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkBatch {
	count: usize,
	width: usize,
	states: Vec<usize>,
}

impl WalkBatch {
	/// Number of state ids of a `count × width` batch.
	///
	/// # Errors
	/// Returns `MarkovError::Config` if it overflows or exceeds `MAX_BATCH_STATES`.
	fn check_size(count: usize, width: usize) -> Result<usize> {
		count
			.checked_mul(width)
			.filter(|size| *size <= MAX_BATCH_STATES)
			.ok_or_else(|| MarkovError::Config(format!(
				"A batch of {count} walks of {width} states exceeds {MAX_BATCH_STATES} states"
			)))
	}

	/// `count` rows starting at START, padded with END.
	fn filled(count: usize, width: usize) -> Result<Self> {
		let mut states = vec![END; Self::check_size(count, width)?];
		for row in states.chunks_mut(width) {
			row[0] = START;
		}
		Ok(Self { count, width, states })
	}

	fn concat(parts: Vec<WalkBatch>, width: usize) -> Result<Self> {
		let count = parts.iter().map(|part| part.count).sum();
		let mut states = Vec::with_capacity(Self::check_size(count, width)?);
		for part in parts {
			states.extend(part.states);
		}
		Ok(Self { count, width, states })
	}

	pub fn len(&self) -> usize {
		self.count
	}

	pub fn is_empty(&self) -> bool {
		self.count == 0
	}

	pub fn width(&self) -> usize {
		self.width
	}

	/// Full padded row `i`.
	pub fn row(&self, i: usize) -> &[usize] {
		&self.states[i * self.width..(i + 1) * self.width]
	}

	/// Walk `i`, up to and including its first END.
	pub fn walk(&self, i: usize) -> &[usize] {
		let row = self.row(i);
		match row.iter().position(|state| *state == END) {
			Some(end) => &row[..=end],
			None => row,
		}
	}

	pub fn walks(&self) -> impl Iterator<Item = &[usize]> + '_ {
		(0..self.count).map(|i| self.walk(i))
	}

	/// Recovers the text of every walk.
	pub fn strings(&self, indexer: &StateIndexer) -> Vec<String> {
		self.walks().map(|walk| indexer.recover_string(walk)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::config::ModelConfig;
	use crate::model::transition_model::{TransitionCounts, TransitionMatrix};

	fn chain(corpus: &[&str], alphabet: &str, memory: usize) -> (StateIndexer, CumulativeMatrix) {
		let config = ModelConfig::new(alphabet.chars(), memory, 12);
		let indexer = StateIndexer::new(&config).unwrap();
		let matrix = TransitionMatrix::build(corpus, &indexer, &config).unwrap();
		(indexer, matrix.cumulative())
	}

	#[test]
	fn test_rejects_zero_length() {
		let (_, cumulative) = chain(&["a"], "a", 1);
		assert!(ChainSampler::new(&cumulative, 0).is_err());
	}

	#[test]
	fn test_single_walk_ends_with_end() {
		let (indexer, cumulative) = chain(&["abc"], "abc", 2);
		let sampler = ChainSampler::new(&cumulative, 12).unwrap();
		let walk = sampler.sample_one(&mut StdRng::seed_from_u64(1));

		assert_eq!(walk.first(), Some(&START));
		assert_eq!(walk.last(), Some(&END));
		assert_eq!(indexer.recover_string(&walk), "abc");
	}

	#[test]
	fn test_truncation_is_silent() {
		// END is unreachable: "a" only loops on itself
		let config = ModelConfig::new(['a'], 1, 12);
		let mut counts = TransitionCounts::new(StateIndexer::new(&config).unwrap().state_count());
		counts.add_sequence(&[START, 2, 2]);
		let cumulative = TransitionMatrix::from_counts(&counts).cumulative();

		let sampler = ChainSampler::new(&cumulative, 5).unwrap();
		let walk = sampler.sample_one(&mut StdRng::seed_from_u64(7));

		assert_eq!(walk.len(), 5);
		assert!(!walk.contains(&END));

		let sampler = ChainSampler::new(&cumulative, 1).unwrap();
		assert_eq!(sampler.sample_one(&mut StdRng::seed_from_u64(7)), vec![START]);
	}

	#[test]
	fn test_batch_layout() {
		let (indexer, cumulative) = chain(&["ab", "b"], "ab", 1);
		let sampler = ChainSampler::new(&cumulative, 6).unwrap();
		let batch = sampler.sample_many(50, &mut StdRng::seed_from_u64(3)).unwrap();

		assert_eq!(batch.len(), 50);
		assert_eq!(batch.width(), 6);
		for i in 0..batch.len() {
			let row = batch.row(i);
			assert_eq!(row[0], START);
			// Once END is reached the row stays at END
			if let Some(end) = row.iter().position(|s| *s == END) {
				assert!(row[end..].iter().all(|s| *s == END));
			}
		}
		for name in batch.strings(&indexer) {
			assert!(name == "ab" || name == "b", "unexpected {name}");
		}
	}

	#[test]
	fn test_batch_is_reproducible() {
		let (_, cumulative) = chain(&["abc", "bca", "cab"], "abc", 2);
		let sampler = ChainSampler::new(&cumulative, 12).unwrap();
		let first = sampler.sample_many(100, &mut StdRng::seed_from_u64(42)).unwrap();
		let second = sampler.sample_many(100, &mut StdRng::seed_from_u64(42)).unwrap();
		assert_eq!(first, second);
	}

	#[test]
	fn test_parallel_batch() {
		let (indexer, cumulative) = chain(&["abc", "xbz"], "abcxz", 1);
		let sampler = ChainSampler::new(&cumulative, 12).unwrap();

		let batch = sampler.sample_many_parallel(1001, 9).unwrap();
		assert_eq!(batch.len(), 1001);
		assert_eq!(batch, sampler.sample_many_parallel(1001, 9).unwrap());
		for name in batch.strings(&indexer) {
			assert!(["abc", "xbz", "abz", "xbc"].contains(&name.as_str()));
		}

		assert!(sampler.sample_many_parallel(0, 9).unwrap().is_empty());
	}

	#[test]
	fn test_huge_max_length_does_not_preallocate() {
		let (indexer, cumulative) = chain(&["abc"], "abc", 1);
		let sampler = ChainSampler::new(&cumulative, usize::MAX / 4).unwrap();
		let walk = sampler.sample_one(&mut StdRng::seed_from_u64(2));
		assert_eq!(indexer.recover_string(&walk), "abc");
	}

	#[test]
	fn test_oversized_batches_are_rejected() {
		let (_, cumulative) = chain(&["abc"], "abc", 1);
		let mut rng = StdRng::seed_from_u64(4);

		let sampler = ChainSampler::new(&cumulative, 1 << 40).unwrap();
		assert!(matches!(sampler.sample_many(1 << 30, &mut rng), Err(MarkovError::Config(_))));
		assert!(matches!(sampler.sample_many_parallel(1 << 30, 4), Err(MarkovError::Config(_))));

		let sampler = ChainSampler::new(&cumulative, usize::MAX).unwrap();
		assert!(matches!(sampler.sample_many(2, &mut rng), Err(MarkovError::Config(_))));
		// An empty batch needs no storage
		assert!(sampler.sample_many(0, &mut rng).unwrap().is_empty());
	}
}
