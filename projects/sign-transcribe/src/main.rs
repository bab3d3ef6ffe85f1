mod cli;

use anyhow::Result;
use cli::Args;
use sign_transcribe::config::{ModelPaths, Settings};
use sign_transcribe::labels::Vocabulary;
use sign_transcribe::models::{
    ModelRegistry, OnnxEmbedder, OnnxHandLandmarker, SizeFunctionTool, ZernikeDescriptor,
};
use sign_transcribe::{Collaborators, ErrorResponse, Pipeline, PipelineError, Request};
use std::sync::Arc;
use tracing::Level;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse_args();

    // Logs go to stderr; stdout carries the JSON response
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let request = args.request();
    let outcome = build_pipeline(&args, &request)
        .and_then(|pipeline| pipeline.handle(&args.video, &request));

    match outcome {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!("{}", e);
            println!(
                "{}",
                serde_json::to_string_pretty(&ErrorResponse::new(&request, &e))?
            );
            std::process::exit(1);
        }
    }
}

/// Loads settings and every model the request needs.
fn build_pipeline(args: &Args, request: &Request) -> sign_transcribe::Result<Pipeline> {
    let vocabulary = Vocabulary::try_from(request.model_type)?;
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let dir = &args.models_dir;

    let path = ModelPaths::resolve(dir, &settings.models.hand_landmarker);
    let detector = OnnxHandLandmarker::new(&path)
        .map_err(|source| PipelineError::ModelLoad { path, source })?;

    let path = ModelPaths::resolve(dir, &settings.models.embedder);
    let embedder = OnnxEmbedder::new(&path, settings.pipeline.embedding_dim)
        .map_err(|source| PipelineError::ModelLoad { path, source })?;

    let size_function = args
        .size_function
        .clone()
        .unwrap_or_else(|| ModelPaths::resolve(dir, &settings.models.size_function));

    let registry = ModelRegistry::load(&settings.models, dir, &[(vocabulary, request.mode)])?;

    let collaborators = Collaborators {
        detector: Arc::new(detector),
        embedder: Arc::new(embedder),
        diagrams: Arc::new(SizeFunctionTool::new(size_function)),
        descriptor: Arc::new(ZernikeDescriptor::new(
            settings.pipeline.diagram_radius,
            settings.pipeline.zernike_degree,
        )),
    };

    Ok(Pipeline::new(settings.pipeline, collaborators, registry).with_progress(args.progress))
}
