use crate::labels::Vocabulary;
use crate::pipeline::types::FeatureMode;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that surface from the pipeline to the request boundary.
///
/// Per-frame extraction problems never show up here: they are logged and the
/// frame is dropped.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to decode video {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("no valid frames")]
    EmptySequence,

    #[error("invalid model_type {0}: use 1 (letters), 2 (numbers), or 3 (words)")]
    InvalidModelType(u8),

    #[error("failed to load model {path:?}: {source}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("no {mode} classifier loaded for the {vocabulary} vocabulary")]
    ModelNotLoaded {
        vocabulary: Vocabulary,
        mode: FeatureMode,
    },

    #[error("vision error: {0:#}")]
    Vision(#[source] anyhow::Error),

    #[error("inference failed: {0:#}")]
    Inference(#[source] anyhow::Error),

    #[error("scratch storage error: {0}")]
    Scratch(#[from] std::io::Error),

    #[error("invalid configuration {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl From<opencv::Error> for PipelineError {
    fn from(err: opencv::Error) -> Self {
        PipelineError::Vision(err.into())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
