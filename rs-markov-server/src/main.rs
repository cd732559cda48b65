use std::path::PathBuf;
use std::sync::RwLock;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use log::{error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;

use rs_markov_core::{Generator, MarkovError, ModelConfig};

/// Largest batch a single request may ask for.
const MAX_COUNT: usize = 100_000;

/// Longest walk a request may ask for. `MAX_COUNT` walks of this length stay
/// under the core batch limit.
const MAX_LENGTH: usize = 256;

/// Deepest memory `/v1/load_models` accepts (26 letters stay under the core state limit).
const MAX_MEMORY: usize = 5;

/// HTTP service generating names from Markov models trained on `<data>/*.dat`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
	/// Folder holding the corpus files (`*.dat`, one entry per line)
	#[arg(long, default_value = "./data")]
	data: PathBuf,

	#[arg(long, default_value = "127.0.0.1")]
	host: String,

	#[arg(long, default_value_t = 5000)]
	port: u16,

	/// N-gram length used as Markov state
	#[arg(long, default_value_t = 2)]
	memory: usize,

	/// Maximum walk length (START included)
	#[arg(long, default_value_t = 12)]
	max_length: usize,

	/// Load every corpus of the data folder at startup
	#[arg(long)]
	preload: bool,
}

/// Struct representing query parameters for the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	model: Option<String>,
	count: Option<usize>,
	max_length: Option<usize>,
	seed: Option<u64>,
}

#[derive(Deserialize)]
struct ModelQuery {
	names: Option<String>,
	memory: Option<usize>,
}

struct SharedData {
	generator: Generator,
	data: PathBuf,
}

fn error_response(e: MarkovError) -> HttpResponse {
	match e {
		MarkovError::ModelNotFound(_) => HttpResponse::NotFound().body(e.to_string()),
		MarkovError::Config(_) | MarkovError::InvalidLength { .. } | MarkovError::InvalidSymbol { .. } => {
			HttpResponse::BadRequest().body(e.to_string())
		}
		MarkovError::Io(_) | MarkovError::Serialization(_) => {
			error!("{e}");
			HttpResponse::InternalServerError().body(e.to_string())
		}
	}
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates `count` names (default 1) from `model`, one per line.
/// `seed` makes the answer reproducible.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<RwLock<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let name = match &query.model {
		Some(name) if !name.trim().is_empty() => name.trim(),
		_ => return HttpResponse::BadRequest().body("Missing model name"),
	};
	let count = query.count.unwrap_or(1);
	if count > MAX_COUNT {
		return HttpResponse::BadRequest().body(format!("count must be <= {MAX_COUNT}"));
	}
	if query.max_length.is_some_and(|max_length| max_length > MAX_LENGTH) {
		return HttpResponse::BadRequest().body(format!("max_length must be <= {MAX_LENGTH}"));
	}

	let shared_data = match data.read() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	let result = match query.seed {
		Some(seed) => shared_data.generator.generate(name, count, query.max_length, &mut StdRng::seed_from_u64(seed)),
		None => shared_data.generator.generate(name, count, query.max_length, &mut rand::rng()),
	};

	match result {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(e) => error_response(e),
	}
}

#[get("/v1/models")]
async fn get_models(data: web::Data<RwLock<SharedData>>) -> impl Responder {
	let folder = match data.read() {
		Ok(m) => m.data.clone(),
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match Generator::available_models(&folder) {
		Ok(names) => HttpResponse::Ok().body(names.join("\n")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list models"),
	}
}

#[get("/v1/loaded_models")]
async fn get_loaded_models(data: web::Data<RwLock<SharedData>>) -> impl Responder {
	let shared_data = match data.read() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	HttpResponse::Ok().body(shared_data.generator.model_names().join("\n"))
}

/// HTTP PUT endpoint `/v1/load_models`
///
/// Replaces the loaded models with `names` (comma separated), trained at
/// `memory` (defaults to the current one). Training happens outside the lock.
#[put("/v1/load_models")]
async fn put_model(data: web::Data<RwLock<SharedData>>, query: web::Query<ModelQuery>) -> impl Responder {
	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty model name"),
	};

	let (mut config, folder) = match data.read() {
		Ok(m) => (m.generator.config().clone(), m.data.clone()),
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	if let Some(memory) = query.memory {
		if memory > MAX_MEMORY {
			return HttpResponse::BadRequest().body(format!("memory must be <= {MAX_MEMORY}"));
		}
		config.memory = memory;
	}

	let mut generator = match Generator::with_config(config) {
		Ok(g) => g,
		Err(e) => return error_response(e),
	};
	for name in query_names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
		if name.contains(['/', '\\']) || name.starts_with('.') {
			return HttpResponse::BadRequest().body(format!("Invalid model name: {name}"));
		}
		if let Err(e) = generator.load_model(folder.join(format!("{name}.dat"))) {
			return HttpResponse::InternalServerError().body(format!("Failed to load model {name}: {e}"));
		}
	}

	match data.write() {
		Ok(mut m) => m.generator = generator,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	}
	HttpResponse::Ok().body("Models loaded successfully")
}

/// Main entry point for the server.
///
/// Builds the generator, wraps it in a `RwLock` (generation only reads it),
/// and starts an Actix-web HTTP server.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
	let args = Args::parse();
	if args.max_length > MAX_LENGTH || args.memory > MAX_MEMORY {
		return Err(std::io::Error::new(
			std::io::ErrorKind::InvalidInput,
			format!("max_length must be <= {MAX_LENGTH} and memory <= {MAX_MEMORY}"),
		));
	}

	let config = ModelConfig { memory: args.memory, max_length: args.max_length, ..ModelConfig::default() };
	let generator = if args.preload {
		Generator::new(&args.data, config)
	} else {
		Generator::with_config(config)
	}
	.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

	let shared_data = SharedData { generator, data: args.data };
	let shared_model = web::Data::new(RwLock::new(shared_data));

	info!("Listening on {}:{}", args.host, args.port);
	HttpServer::new(move || {
		App::new()
			.wrap(Logger::default())
			.wrap(Cors::permissive())
			.app_data(shared_model.clone())
			.service(get_generated)
			.service(get_models)
			.service(put_model)
			.service(get_loaded_models)
	})
		.bind((args.host.as_str(), args.port))?
		.run()
		.await
}
