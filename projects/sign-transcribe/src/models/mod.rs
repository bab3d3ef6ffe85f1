// Seams to the external collaborators: hand landmarks, image embeddings,
// shape-descriptor diagrams, and the sequence classifier.

pub mod onnx;
pub mod registry;
pub mod size_function;
pub mod zernike;

use crate::pipeline::types::HandObservation;
use anyhow::Result;
use opencv::core::Mat;
use std::path::{Path, PathBuf};

pub use onnx::{OnnxEmbedder, OnnxHandLandmarker, OnnxSequenceClassifier};
pub use registry::ModelRegistry;
pub use size_function::SizeFunctionTool;
pub use zernike::ZernikeDescriptor;

/// Finds hands in a BGR frame. Returns zero to two observations.
pub trait HandDetector: Send + Sync {
    fn detect(&self, image: &Mat) -> Result<Vec<HandObservation>>;
}

/// Maps a rendered hand image to a fixed-size vector.
///
/// Implementations never fail: on internal errors they log and return
/// `vec![0.0; self.dim()]`.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, image: &Mat) -> Vec<f32>;
}

/// Renders the ranked shape diagrams of a binary hand mask.
///
/// `workdir` is a scratch directory owned by the calling request; the
/// returned diagram files live inside it and are ordered by file name.
pub trait DiagramGenerator: Send + Sync {
    fn diagrams(&self, mask: &Mat, angle: u32, radius: u32, workdir: &Path)
        -> Result<Vec<PathBuf>>;
}

/// Turns one diagram file into a fixed-size rotation-invariant descriptor.
///
/// Undecodable diagrams yield `vec![0.0; self.dim()]`.
pub trait ShapeDescriptor: Send + Sync {
    fn dim(&self) -> usize;
    fn describe(&self, diagram: &Path) -> Vec<f32>;
}

/// A padded feature sequence ready for classification.
pub struct ClassifierInput<'a> {
    /// `max_seq_len` rows of `2 * embedding_dim` values.
    pub embeddings: &'a [Vec<f32>],
    /// `max_seq_len` matrices of `2 * diagrams_per_hand` descriptor rows;
    /// present only for dual-stream classifiers.
    pub descriptors: Option<&'a [Vec<Vec<f32>>]>,
}

/// Produces a probability distribution over a vocabulary's class indices.
pub trait SequenceClassifier: Send + Sync {
    fn predict(&self, input: &ClassifierInput<'_>) -> Result<Vec<f32>>;
}
