//! Top-level module for the n-gram Markov chain.
//!
//! This module provides, leaf first:
//! - Model configuration (`ModelConfig`)
//! - The n-gram ⇄ state id mapping (`StateIndexer`)
//! - Transition counting and normalization (`TransitionMatrix`, `CumulativeMatrix`)
//! - Single and batched random walks (`ChainSampler`)
//! - A trained, persistable model (`MarkovModel`)
//! - A registry of named models (`Generator`)

/// Construction parameters: alphabet, memory depth, walk length bound,
/// corpus ingestion options.
pub mod config;

/// Dense state ids for variable-length n-grams, and back.
///
/// Uses closed-form block offsets, no table proportional to the state count.
pub mod state_indexer;

/// Corpus counting (sequential or parallel), row normalization,
/// cumulative rows for inverse-CDF sampling.
pub mod transition_model;

/// Random walks from START to END, one at a time or batched.
pub mod sampler;

/// Trained model: configuration, indexer and matrices.
///
/// Supports training from a corpus file, `postcard` persistence and generation.
pub mod markov_model;

/// Registry of named models loaded from a folder of corpora.
pub mod generator;
