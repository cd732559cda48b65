use std::collections::HashMap;

use crate::error::{MarkovError, Result};
use super::config::ModelConfig;

/// Symbol marking the beginning of every word.
pub const START_CHAR: char = '<';
/// Symbol marking the end of every word.
pub const END_CHAR: char = '>';

/// State id of the START delimiter.
pub const START: usize = 0;
/// State id of the END delimiter.
pub const END: usize = 1;

/// Number of states of an alphabet of `alphabet_size` symbols at depth `memory`:
/// `2 + Σ_{k=1..memory} alphabet_size^k`.
///
/// Returns `None` on overflow.
pub fn state_count(alphabet_size: usize, memory: usize) -> Option<usize> {
	let mut count: usize = 2;
	let mut block: usize = 1;
	for _ in 0..memory {
		block = block.checked_mul(alphabet_size)?;
		count = count.checked_add(block)?;
	}
	Some(count)
}

/// Bidirectional mapping between symbol n-grams and dense state ids.
///
/// Ids are laid out as:
/// - `0`: START, `1`: END
/// - then one contiguous block per n-gram length `k` in `1..=memory`, of size `A^k`,
///   starting at `2 + Σ_{j<k} A^j`
///
/// Inside a block an n-gram reads as a base-`A` number, its last symbol being the
/// least significant digit. Each block is therefore in lexicographic order of the
/// alphabet, and since every `A^j` (`j >= 1`) is a multiple of `A`, the last symbol
/// of any id is simply `alphabet[(id - 2) % A]`.
///
/// Only the alphabet and `memory + 1` block offsets are stored, never the `A^M` labels.
#[derive(Clone, Debug)]
pub struct StateIndexer {
	alphabet: Vec<char>,
	/// Reverse lookup symbol → digit.
	positions: HashMap<char, usize>,
	memory: usize,
	/// `block_offsets[k - 1]` is the first id of length-`k` n-grams;
	/// the last element is the total state count.
	block_offsets: Vec<usize>,
}

impl StateIndexer {
	/// Creates the indexer of a configuration.
	///
	/// # Errors
	/// Returns `MarkovError::Config` if the configuration is invalid.
	pub fn new(config: &ModelConfig) -> Result<Self> {
		config.validate()?;

		let size = config.alphabet.len();
		let mut block_offsets = Vec::with_capacity(config.memory + 1);
		let mut offset = 2;
		let mut block = 1;
		for _ in 0..config.memory {
			block_offsets.push(offset);
			// Cannot overflow, checked by `validate`
			block *= size;
			offset += block;
		}
		block_offsets.push(offset);

		Ok(Self {
			alphabet: config.alphabet.clone(),
			positions: config.alphabet.iter().enumerate().map(|(i, c)| (*c, i)).collect(),
			memory: config.memory,
			block_offsets,
		})
	}

	pub fn alphabet(&self) -> &[char] {
		&self.alphabet
	}

	pub fn memory(&self) -> usize {
		self.memory
	}

	/// Total number of states, delimiters included.
	pub fn state_count(&self) -> usize {
		self.block_offsets[self.memory]
	}

	/// Position of `symbol` in the alphabet.
	pub fn symbol_index(&self, symbol: char) -> Result<usize> {
		self.positions
			.get(&symbol)
			.copied()
			.ok_or(MarkovError::InvalidSymbol { symbol })
	}

	/// Returns the state id of an n-gram.
	///
	/// `"<"` and `">"` are the START and END delimiters whatever the memory.
	///
	/// # Errors
	/// - `InvalidSymbol` if a character is not in the alphabet
	/// - `InvalidLength` if the n-gram is empty or longer than `memory`
	pub fn state_index(&self, ngram: &str) -> Result<usize> {
		let chars: Vec<char> = ngram.chars().collect();
		self.state_index_of(&chars)
	}

	/// Same as `state_index`, on an already split n-gram.
	pub fn state_index_of(&self, ngram: &[char]) -> Result<usize> {
		match ngram {
			[START_CHAR] => return Ok(START),
			[END_CHAR] => return Ok(END),
			_ => (),
		}
		if ngram.is_empty() || ngram.len() > self.memory {
			return Err(MarkovError::InvalidLength { length: ngram.len(), memory: self.memory });
		}

		let size = self.alphabet.len();
		let mut id_in_block = 0;
		for symbol in ngram {
			id_in_block = id_in_block * size + self.symbol_index(*symbol)?;
		}
		Ok(self.block_offsets[ngram.len() - 1] + id_in_block)
	}

	/// Length of the n-gram behind `id`; 0 for delimiters, `None` when out of range.
	pub fn ngram_length(&self, id: usize) -> Option<usize> {
		match id {
			START | END => Some(0),
			_ if id >= self.state_count() => None,
			_ => Some(self.block_offsets.partition_point(|offset| *offset <= id)),
		}
	}

	/// Full label of a state: its n-gram, or the delimiter symbol.
	pub fn state_label(&self, id: usize) -> Option<String> {
		let length = self.ngram_length(id)?;
		match id {
			START => return Some(START_CHAR.to_string()),
			END => return Some(END_CHAR.to_string()),
			_ => (),
		}

		let size = self.alphabet.len();
		let mut rest = id - self.block_offsets[length - 1];
		let mut label = vec![START_CHAR; length];
		for slot in label.iter_mut().rev() {
			*slot = self.alphabet[rest % size];
			rest /= size;
		}
		Some(label.into_iter().collect())
	}

	/// Enumerates the labels of every state of depth `memory`, in id order:
	/// START, END, every 1-gram, every 2-gram...
	///
	/// Depth `m` ids are a prefix of depth `M` ids, so any `memory` up to the
	/// indexer's own is accepted.
	///
	/// # Errors
	/// Returns `InvalidLength` if `memory` is 0 or deeper than the indexer.
	pub fn state_labels(&self, memory: usize) -> Result<Vec<String>> {
		if memory == 0 || memory > self.memory {
			return Err(MarkovError::InvalidLength { length: memory, memory: self.memory });
		}
		Ok((0..self.block_offsets[memory])
			.filter_map(|id| self.state_label(id))
			.collect())
	}

	/// Last symbol of the n-gram behind `id` (delimiters return themselves).
	///
	/// O(1): no label is decoded.
	pub fn last_character(&self, id: usize) -> Option<char> {
		match id {
			START => Some(START_CHAR),
			END => Some(END_CHAR),
			_ if id >= self.state_count() => None,
			_ => Some(self.alphabet[(id - 2) % self.alphabet.len()]),
		}
	}

	/// Converts a walk back into text: last symbol of each state, delimiters dropped.
	///
	/// Ids must come from this indexer's space. An out-of-range id has no
	/// symbol: it is skipped in release builds and trips a debug assertion otherwise.
	pub fn recover_string(&self, ids: &[usize]) -> String {
		debug_assert!(
			ids.iter().all(|id| *id < self.state_count()),
			"state id out of range (state count {})",
			self.state_count()
		);
		ids.iter()
			.filter(|id| **id != START && **id != END)
			.filter_map(|id| self.last_character(*id))
			.collect()
	}

	/// Splits a word into the state sequence the chain observes:
	/// START, the growing prefixes shorter than the window, every window, END.
	///
	/// The window is `memory` wide, or the word's own length if shorter.
	///
	/// # Errors
	/// Returns `InvalidSymbol` if the word contains a symbol outside the alphabet.
	pub fn observation_sequence(&self, word: &[char]) -> Result<Vec<usize>> {
		let width = self.memory.min(word.len());
		let mut sequence = Vec::with_capacity(word.len() + 2);

		sequence.push(START);
		for length in 1..width {
			sequence.push(self.state_index_of(&word[..length])?);
		}
		if width > 0 {
			for window in word.windows(width) {
				sequence.push(self.state_index_of(window)?);
			}
		}
		sequence.push(END);

		Ok(sequence)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn indexer(alphabet: &str, memory: usize) -> StateIndexer {
		StateIndexer::new(&ModelConfig::new(alphabet.chars(), memory, 12)).unwrap()
	}

	#[test]
	fn test_state_count() {
		assert_eq!(state_count(26, 1), Some(28));
		assert_eq!(state_count(26, 3), Some(2 + 26 + 676 + 17576));
		assert_eq!(state_count(2, 200), None);
		assert_eq!(indexer("abc", 2).state_count(), 2 + 3 + 9);
	}

	#[test]
	fn test_delimiters_are_fixed() {
		let indexer = indexer("abc", 3);
		assert_eq!(indexer.state_index("<").unwrap(), START);
		assert_eq!(indexer.state_index(">").unwrap(), END);
		assert_eq!(indexer.last_character(START), Some(START_CHAR));
		assert_eq!(indexer.last_character(END), Some(END_CHAR));
	}

	#[test]
	fn test_block_layout() {
		let indexer = indexer("abc", 2);
		assert_eq!(indexer.state_index("a").unwrap(), 2);
		assert_eq!(indexer.state_index("c").unwrap(), 4);
		assert_eq!(indexer.state_index("aa").unwrap(), 5);
		assert_eq!(indexer.state_index("ab").unwrap(), 6);
		assert_eq!(indexer.state_index("ba").unwrap(), 8);
		assert_eq!(indexer.state_index("cc").unwrap(), 13);
	}

	#[test]
	fn test_invalid_inputs() {
		let indexer = indexer("abc", 2);
		assert!(matches!(indexer.state_index("ad"), Err(MarkovError::InvalidSymbol { symbol: 'd' })));
		assert!(matches!(indexer.state_index(""), Err(MarkovError::InvalidLength { length: 0, memory: 2 })));
		assert!(matches!(indexer.state_index("abc"), Err(MarkovError::InvalidLength { length: 3, memory: 2 })));
		assert!(indexer.state_labels(3).is_err());
		assert!(indexer.state_labels(0).is_err());
	}

	#[test]
	fn test_state_labels_order() {
		let indexer = indexer("ab", 2);
		assert_eq!(
			indexer.state_labels(2).unwrap(),
			vec!["<", ">", "a", "b", "aa", "ab", "ba", "bb"]
		);
		assert_eq!(indexer.state_labels(1).unwrap(), vec!["<", ">", "a", "b"]);
	}

	#[test]
	fn test_last_character_and_length() {
		let indexer = indexer("xyz", 3);
		let id = indexer.state_index("zxy").unwrap();
		assert_eq!(indexer.last_character(id), Some('y'));
		assert_eq!(indexer.ngram_length(id), Some(3));
		assert_eq!(indexer.last_character(indexer.state_count()), None);
		assert_eq!(indexer.ngram_length(indexer.state_count()), None);
	}

	#[test]
	fn test_observation_sequence() {
		let indexer = indexer("abcd", 3);
		let word: Vec<char> = "abcd".chars().collect();
		let expected = vec![
			START,
			indexer.state_index("a").unwrap(),
			indexer.state_index("ab").unwrap(),
			indexer.state_index("abc").unwrap(),
			indexer.state_index("bcd").unwrap(),
			END,
		];
		assert_eq!(indexer.observation_sequence(&word).unwrap(), expected);
	}

	#[test]
	fn test_observation_sequence_of_short_words() {
		let indexer = indexer("ab", 3);
		let single = indexer.observation_sequence(&['a']).unwrap();
		assert_eq!(single, vec![START, 2, END]);

		let pair = indexer.observation_sequence(&['b', 'a']).unwrap();
		assert_eq!(pair, vec![START, indexer.state_index("b").unwrap(), indexer.state_index("ba").unwrap(), END]);
	}

	#[test]
	fn test_recover_string() {
		let indexer = indexer("abcd", 3);
		let word: Vec<char> = "dabbca".chars().collect();
		let sequence = indexer.observation_sequence(&word).unwrap();
		assert_eq!(indexer.recover_string(&sequence), "dabbca");
		assert_eq!(indexer.recover_string(&[START, END]), "");
	}

	#[test]
	#[cfg(debug_assertions)]
	#[should_panic(expected = "state id out of range")]
	fn test_recover_string_rejects_foreign_ids() {
		let indexer = indexer("ab", 1);
		indexer.recover_string(&[START, 2, 4, END]);
	}
}
