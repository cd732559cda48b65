use std::time::Instant;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use log::info;
use rs_markov_core::{read_corpus, Generator, MarkovModel, ModelConfig};

/// Generates names from the corpora of a data folder.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Folder holding the corpus files (`*.dat`)
    #[arg(long, default_value = "./data")]
    data: String,

    /// Only use this corpus (file name without extension)
    #[arg(long)]
    model: Option<String>,

    #[arg(long, default_value_t = 2)]
    memory: usize,

    #[arg(long, default_value_t = 12)]
    max_length: usize,

    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Use the alphabet found in the corpus instead of `a..=z`
    #[arg(long)]
    corpus_alphabet: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ModelConfig {
        memory: args.memory,
        max_length: args.max_length,
        ..ModelConfig::default()
    };

    // Either a single corpus, possibly with its own alphabet,
    // or every `.dat` file of the folder with the default one
    let generator = match &args.model {
        Some(name) => {
            let path = format!("{}/{}.dat", args.data.trim_end_matches('/'), name);
            let config = if args.corpus_alphabet {
                config.with_corpus_alphabet(&read_corpus(&path)?)
            } else {
                config
            };
            let mut generator = Generator::with_config(config.clone())?;
            generator.insert(name.as_str(), MarkovModel::from_corpus_file(&path, config)?);
            generator
        }
        None => Generator::new(&args.data, config)?,
    };

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    for name in generator.model_names() {
        let model = generator.model(&name)?;
        println!(
            "== {} ({} states, {} transitions)",
            name,
            model.indexer().state_count(),
            model.matrix().nonzero_count()
        );

        // One walk at a time
        for i in 0..args.count {
            println!("Generated word {}: {}", i + 1, model.generate(&mut rng)?);
        }

        // The batched sampler draws every walk in the same pass
        let start = Instant::now();
        let batch = generator.generate(&name, 100_000, None, &mut rng)?;
        info!("Batched {} names of {} in {:?}", batch.len(), name, start.elapsed());
        println!("Batched samples: {}", batch[..5.min(batch.len())].join(", "));
    }

    Ok(())
}
