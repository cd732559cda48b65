use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use rand::Rng;

use crate::error::{MarkovError, Result};
use crate::io;
use crate::model::config::ModelConfig;
use crate::model::markov_model::MarkovModel;

/// High-level registry of named Markov models.
///
/// # Responsibilities
/// - Load one `MarkovModel` per corpus file of a folder
/// - Route generation requests to a model by name
///
/// Models are read-only once loaded, so a `&Generator` can serve any number of
/// concurrent generation requests.
#[derive(Debug, Default)]
pub struct Generator {
	config: ModelConfig,
	models: BTreeMap<String, MarkovModel>,
}

impl Generator {
	/// Creates an empty generator; models loaded later use `config`.
	pub fn with_config(config: ModelConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self { config, models: BTreeMap::new() })
	}

	/// Creates a generator by loading all `.dat` corpora from a directory.
	///
	/// # Parameters
	/// - `filepath`: Path to a directory containing corpus files.
	///   Both `"folder"` and `"folder/"` are accepted.
	/// - `config`: configuration every model is trained with.
	///
	/// # Behavior
	/// - The model name is the file name without extension.
	/// - Each corpus reuses its `.bin` cache when it matches `config`.
	///
	/// # Errors
	/// - Returns an error if the path is not a directory.
	/// - Returns an error if a model fails to load.
	pub fn new<P: AsRef<Path>>(filepath: P, config: ModelConfig) -> Result<Self> {
		let mut generator = Self::with_config(config)?;

		let string_path = filepath
			.as_ref()
			.to_str()
			.ok_or_else(|| MarkovError::Config("Invalid filepath".to_owned()))?;
		// Normalize "folder" / "folder/"
		let folder = io::normalize_folder(string_path);

		if !folder.is_dir() {
			return Err(MarkovError::Config(format!("Expected a directory, got: {}", folder.display())));
		}

		for file in io::list_files(&folder, "dat")? {
			generator.load_model(folder.join(&file))?;
		}

		info!("Loaded {} models from {}", generator.models.len(), folder.display());
		Ok(generator)
	}

	/// Names of the corpora (`*.dat`) found in `folder`, sorted, without extension.
	///
	/// # Errors
	/// Returns `MarkovError::Io` if the folder cannot be read.
	pub fn available_models<P: AsRef<Path>>(folder: P) -> Result<Vec<String>> {
		io::list_files(folder, "dat")?
			.iter()
			.map(|file| io::get_filename(file).map_err(MarkovError::from))
			.collect()
	}

	pub fn config(&self) -> &ModelConfig {
		&self.config
	}

	/// Returns the names of the loaded models, sorted.
	pub fn model_names(&self) -> Vec<String> {
		self.models.keys().cloned().collect()
	}

	/// Loads the corpus file `filepath` under its file stem.
	///
	/// # Errors
	/// Returns an error if a model with this name is already loaded or if the
	/// corpus cannot be read or trained.
	pub fn load_model<P: AsRef<Path>>(&mut self, filepath: P) -> Result<()> {
		let key = io::get_filename(&filepath)?;
		if self.models.contains_key(&key) {
			return Err(MarkovError::Config(format!("Model {key} already loaded")));
		}
		let model = MarkovModel::from_corpus_file(filepath, self.config.clone())?;
		self.insert(key, model);
		Ok(())
	}

	/// Registers an already trained model, replacing any model of the same name.
	pub fn insert(&mut self, name: impl Into<String>, model: MarkovModel) {
		self.models.insert(name.into(), model);
	}

	/// Returns the model registered under `name`.
	pub fn model(&self, name: &str) -> Result<&MarkovModel> {
		self.models.get(name).ok_or_else(|| MarkovError::ModelNotFound(name.to_owned()))
	}

	/// Generates `count` strings from the model `name`.
	///
	/// `max_length` overrides the configured walk length bound.
	pub fn generate<R: Rng + ?Sized>(
		&self,
		name: &str,
		count: usize,
		max_length: Option<usize>,
		rng: &mut R,
	) -> Result<Vec<String>> {
		let model = self.model(name)?;
		let batch = model.sampler(max_length)?.sample_many(count, rng)?;
		Ok(model.recover(&batch))
	}
}
