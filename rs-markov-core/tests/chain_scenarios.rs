//! Scenario tests: hand-checked matrices, degenerate corpora and the statistical
//! equivalence of batched and single-walk sampling.

use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;

use rs_markov_core::{ChainSampler, MarkovModel, ModelConfig, StateIndexer, TransitionMatrix, END, START};

const SAMPLES: usize = 100_000;

fn frequencies<I: IntoIterator<Item = String>>(names: I) -> HashMap<String, f64> {
	let mut counts: HashMap<String, usize> = HashMap::new();
	let mut total = 0;
	for name in names {
		*counts.entry(name).or_insert(0) += 1;
		total += 1;
	}
	counts.into_iter().map(|(name, count)| (name, count as f64 / total as f64)).collect()
}

#[test]
fn test_two_word_corpus_matrix() {
	let config = ModelConfig::new("abcxz".chars(), 1, 12);
	let indexer = StateIndexer::new(&config).unwrap();
	let matrix = TransitionMatrix::build(&["abc", "xbz"], &indexer, &config).unwrap();
	let id = |s: &str| indexer.state_index(s).unwrap();

	let mut expected = vec![vec![0.0; indexer.state_count()]; indexer.state_count()];
	expected[START][id("a")] = 0.5;
	expected[START][id("x")] = 0.5;
	expected[id("a")][id("b")] = 1.0;
	expected[id("b")][id("c")] = 0.5;
	expected[id("b")][id("z")] = 0.5;
	expected[id("c")][END] = 1.0;
	expected[id("z")][END] = 1.0;
	expected[id("x")][id("b")] = 1.0;
	// Absorbing END
	expected[END][END] = 1.0;

	assert_eq!(matrix.to_dense(), expected);
}

#[test]
fn test_two_word_corpus_samples() {
	let model = MarkovModel::train(&["abc", "xbz"], ModelConfig::new("abcxz".chars(), 1, 12)).unwrap();
	let names = model.generate_many(SAMPLES, &mut StdRng::seed_from_u64(2024)).unwrap();

	let freq = frequencies(names);
	let mut produced: Vec<&str> = freq.keys().map(String::as_str).collect();
	produced.sort();
	assert_eq!(produced, vec!["abc", "abz", "xbc", "xbz"]);
	for p in freq.values() {
		assert!((p - 0.25).abs() < 0.01, "frequency {p} is far from 0.25");
	}
}

#[test]
fn test_single_letter_corpus() {
	let config = ModelConfig::new("abc".chars(), 1, 12);
	let model = MarkovModel::train(&["a"], config).unwrap();
	let a = model.indexer().state_index("a").unwrap();

	assert_eq!(model.matrix().probability(START, a), 1.0);
	assert_eq!(model.matrix().probability(a, END), 1.0);

	let mut rng = StdRng::seed_from_u64(1);
	for _ in 0..100 {
		assert_eq!(model.generate(&mut rng).unwrap(), "a");
	}
	assert!(model.generate_many(1000, &mut rng).unwrap().iter().all(|name| name == "a"));
}

#[test]
fn test_short_words_at_deep_memory() {
	let config = ModelConfig::new("ab".chars(), 4, 12);
	let model = MarkovModel::train(&["a", "ab"], config).unwrap();
	let id = |s: &str| model.indexer().state_index(s).unwrap();

	assert_eq!(model.matrix().probability(START, id("a")), 1.0);
	assert_eq!(model.matrix().probability(id("a"), END), 0.5);
	assert_eq!(model.matrix().probability(id("a"), id("ab")), 0.5);
	assert_eq!(model.matrix().probability(id("ab"), END), 1.0);

	let names = model.generate_many(1000, &mut StdRng::seed_from_u64(8)).unwrap();
	assert!(names.iter().all(|name| name == "a" || name == "ab"));
}

#[test]
fn test_build_is_order_insensitive() {
	let config = ModelConfig::new("abcdr".chars(), 2, 12);
	let indexer = StateIndexer::new(&config).unwrap();
	let corpus = ["abracadabra", "cadabra", "bard", "dab"];
	let reversed: Vec<&str> = corpus.iter().rev().copied().collect();

	let first = TransitionMatrix::build(&corpus, &indexer, &config).unwrap();
	let second = TransitionMatrix::build(&reversed, &indexer, &config).unwrap();
	assert_eq!(first, second);
}

#[test]
fn test_batched_matches_single_walks() {
	let corpus = ["anna", "hannah", "nathan", "hana", "ann", "nat"];
	let config = ModelConfig::new("ahnt".chars(), 2, 12);
	let model = MarkovModel::train(&corpus, config).unwrap();
	let sampler = ChainSampler::new(model.cumulative(), 12).unwrap();

	let mut rng = StdRng::seed_from_u64(99);
	let batched = frequencies(model.recover(&sampler.sample_many(SAMPLES, &mut rng).unwrap()));
	let single = frequencies((0..SAMPLES).map(|_| model.indexer().recover_string(&sampler.sample_one(&mut rng))));

	let mut top: Vec<(&String, &f64)> = batched.iter().collect();
	top.sort_by(|a, b| b.1.total_cmp(a.1));
	for (name, p) in top.into_iter().take(10) {
		let q = single.get(name).copied().unwrap_or(0.0);
		assert!((p - q).abs() < 0.01, "{name}: batched {p} vs single {q}");
	}
}

#[test]
fn test_parallel_batch_matches_distribution() {
	let model = MarkovModel::train(&["abc", "xbz"], ModelConfig::new("abcxz".chars(), 1, 12)).unwrap();
	let freq = frequencies(model.generate_many_parallel(SAMPLES, 5).unwrap());

	assert_eq!(freq.len(), 4);
	for p in freq.values() {
		assert!((p - 0.25).abs() < 0.01);
	}
}
