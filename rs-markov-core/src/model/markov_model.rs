use std::path::Path;

use log::{info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MarkovError, Result};
use crate::io::{build_output_path, read_corpus};
use super::config::ModelConfig;
use super::sampler::{ChainSampler, WalkBatch};
use super::state_indexer::StateIndexer;
use super::transition_model::{CumulativeMatrix, TransitionMatrix};

/// What is written to disk: the configuration (alphabet, memory...) and the matrix.
/// The indexer and the cumulative matrix are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct ModelSnapshot {
	config: ModelConfig,
	matrix: TransitionMatrix,
}

/// A trained n-gram Markov chain.
///
/// This struct manages:
/// - `config`: alphabet, memory depth and walk length bound, fixed for its lifetime
/// - `indexer`: the n-gram ⇄ state id mapping of `config`
/// - `matrix` and `cumulative`: the transition probabilities, read-only once built
///
/// A model is never updated incrementally: a new corpus means a new model.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(into = "ModelSnapshot", try_from = "ModelSnapshot")]
pub struct MarkovModel {
	config: ModelConfig,
	indexer: StateIndexer,
	matrix: TransitionMatrix,
	cumulative: CumulativeMatrix,
}

impl MarkovModel {
	/// Trains a model on an in-memory corpus (single thread).
	///
	/// # Errors
	/// - `Config` if the configuration is invalid
	/// - `InvalidSymbol` if an entry is out of the alphabet under the `Reject` policy
	pub fn train<S: AsRef<str>>(corpus: &[S], config: ModelConfig) -> Result<Self> {
		let indexer = StateIndexer::new(&config)?;
		let matrix = TransitionMatrix::build(corpus, &indexer, &config)?;
		Ok(Self::assemble(config, indexer, matrix))
	}

	/// Trains a model, counting the corpus on every core.
	pub fn train_parallel<S>(corpus: &[S], config: ModelConfig) -> Result<Self>
	where
		S: AsRef<str> + Sync,
	{
		let indexer = StateIndexer::new(&config)?;
		let matrix = TransitionMatrix::build_parallel(corpus, &indexer, &config)?;
		Ok(Self::assemble(config, indexer, matrix))
	}

	/// Rebuilds a model from a configuration and an existing matrix.
	///
	/// # Errors
	/// Returns `Config` if the configuration is invalid or the matrix does not
	/// match its state space.
	pub fn from_matrix(config: ModelConfig, matrix: TransitionMatrix) -> Result<Self> {
		let indexer = StateIndexer::new(&config)?;
		matrix.check_layout(indexer.state_count())?;
		Ok(Self::assemble(config, indexer, matrix))
	}

	fn assemble(config: ModelConfig, indexer: StateIndexer, matrix: TransitionMatrix) -> Self {
		let cumulative = matrix.cumulative();
		Self { config, indexer, matrix, cumulative }
	}

	/// Loads a model trained on a corpus file (one entry per line).
	///
	/// - Looks for a binary cache next to the corpus (`names.dat` → `names.bin`)
	/// - Uses it if it was trained with the same configuration
	/// - Otherwise, or if the cache cannot be read, trains on the corpus in
	///   parallel and (re)writes the cache
	pub fn from_corpus_file<P: AsRef<Path>>(filepath: P, config: ModelConfig) -> Result<Self> {
		let binary_data_path = build_output_path(&filepath, "bin")?;
		if binary_data_path.exists() {
			match Self::load(&binary_data_path) {
				Ok(cached) if cached.config == config => {
					info!("Loaded cached model {}", binary_data_path.display());
					return Ok(cached);
				}
				Ok(_) => info!("Cached model {} has another configuration, retraining", binary_data_path.display()),
				Err(e) => warn!("Unreadable cached model {} ({e}), retraining", binary_data_path.display()),
			}
		}

		let corpus = read_corpus(&filepath)?;
		info!("Training on {} entries of {} (memory {})", corpus.len(), filepath.as_ref().display(), config.memory);
		let model = Self::train_parallel(&corpus, config)?;
		model.save(&binary_data_path)?;
		Ok(model)
	}

	/// Serializes the model with `postcard`.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let bytes = postcard::to_stdvec(self)?;
		std::fs::write(path, bytes)?;
		Ok(())
	}

	/// Loads a model written by `save`, validating it again.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let bytes = std::fs::read(path)?;
		Ok(postcard::from_bytes(&bytes)?)
	}

	pub fn config(&self) -> &ModelConfig {
		&self.config
	}

	pub fn indexer(&self) -> &StateIndexer {
		&self.indexer
	}

	pub fn matrix(&self) -> &TransitionMatrix {
		&self.matrix
	}

	pub fn cumulative(&self) -> &CumulativeMatrix {
		&self.cumulative
	}

	/// Sampler over this chain; `max_length` defaults to the configured one.
	///
	/// # Errors
	/// Returns `Config` if `max_length` is 0.
	pub fn sampler(&self, max_length: Option<usize>) -> Result<ChainSampler<'_>> {
		ChainSampler::new(&self.cumulative, max_length.unwrap_or(self.config.max_length))
	}

	/// Generates one string.
	pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String> {
		let walk = self.sampler(None)?.sample_one(rng);
		Ok(self.indexer.recover_string(&walk))
	}

	/// Generates `count` strings with the batched sampler.
	pub fn generate_many<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Result<Vec<String>> {
		let batch = self.sampler(None)?.sample_many(count, rng)?;
		Ok(self.recover(&batch))
	}

	/// Generates `count` strings with the batched sampler spread over every core.
	pub fn generate_many_parallel(&self, count: usize, seed: u64) -> Result<Vec<String>> {
		let batch = self.sampler(None)?.sample_many_parallel(count, seed)?;
		Ok(self.recover(&batch))
	}

	/// Texts of a batch of walks drawn from this model.
	pub fn recover(&self, batch: &WalkBatch) -> Vec<String> {
		batch.strings(&self.indexer)
	}
}

impl From<MarkovModel> for ModelSnapshot {
	fn from(model: MarkovModel) -> Self {
		Self { config: model.config, matrix: model.matrix }
	}
}

impl TryFrom<ModelSnapshot> for MarkovModel {
	type Error = MarkovError;

	fn try_from(snapshot: ModelSnapshot) -> Result<Self> {
		Self::from_matrix(snapshot.config, snapshot.matrix)
	}
}
