// Pipeline tunables and model locations.
//
// Both structs deserialize from a single JSON document; absent keys fall back
// to the defaults below.

use crate::error::{PipelineError, Result};
use crate::labels::Vocabulary;
use crate::pipeline::types::FeatureMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Parameters for `calcOpticalFlowFarneback`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct FarnebackParams {
    pub pyr_scale: f64,
    pub levels: i32,
    pub winsize: i32,
    pub iterations: i32,
    pub poly_n: i32,
    pub poly_sigma: f64,
    pub flags: i32,
}

impl Default for FarnebackParams {
    fn default() -> Self {
        Self {
            pyr_scale: 0.5,
            levels: 3,
            winsize: 15,
            iterations: 3,
            poly_n: 5,
            poly_sigma: 1.2,
            flags: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Mean optical-flow magnitude above which a frame counts as moving.
    pub motion_threshold: f64,
    pub farneback: FarnebackParams,
    /// Minimum landmark displacement for a frame to be salient.
    pub landmark_distance_threshold: f32,
    pub max_salient_frames: usize,
    /// Fixed temporal length fed to the classifier.
    pub max_seq_len: usize,
    /// Segment predictions below this confidence are left out of the sentence.
    pub confidence_threshold: f32,
    pub diagram_angle: u32,
    pub diagram_radius: u32,
    pub zernike_degree: usize,
    pub diagrams_per_hand: usize,
    pub embedding_dim: usize,
    pub mask_upscale: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            motion_threshold: 2.0,
            farneback: FarnebackParams::default(),
            landmark_distance_threshold: 0.05,
            max_salient_frames: 10,
            max_seq_len: 10,
            confidence_threshold: 0.7,
            diagram_angle: 200,
            diagram_radius: 200,
            zernike_degree: 8,
            diagrams_per_hand: 6,
            embedding_dim: 1280,
            mask_upscale: 2.0,
        }
    }
}

/// Classifier files for one vocabulary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClassifierFiles {
    /// Dual-stream model (embeddings + shape descriptors).
    pub complex: PathBuf,
    /// Embedding-only model.
    pub simple: PathBuf,
}

impl ClassifierFiles {
    fn new(complex: &str, simple: &str) -> Self {
        Self {
            complex: PathBuf::from(complex),
            simple: PathBuf::from(simple),
        }
    }
}

/// Where the model files and the size-function tool live.
///
/// Relative paths are resolved against the models directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelPaths {
    pub letters: ClassifierFiles,
    pub numbers: ClassifierFiles,
    pub words: ClassifierFiles,
    pub embedder: PathBuf,
    pub hand_landmarker: PathBuf,
    pub size_function: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            letters: ClassifierFiles::new(
                "model_dual_stream_letters_frames10_zern8.onnx",
                "model_eff_only_letters_10_frames_zern8.onnx",
            ),
            numbers: ClassifierFiles::new(
                "model_dual_stream_numbers_frames10_zern8.onnx",
                "model_eff_only_numbers_10_frames_zern8.onnx",
            ),
            words: ClassifierFiles::new(
                "model_dual_stream_50_words_10_frames_zern8.onnx",
                "model_eff_only_words_50_frames_10_zern8.onnx",
            ),
            embedder: PathBuf::from("efficientnet_b0_avgpool.onnx"),
            hand_landmarker: PathBuf::from("hand_landmark.onnx"),
            size_function: PathBuf::from("size-function"),
        }
    }
}

impl ModelPaths {
    pub fn classifier(&self, vocabulary: Vocabulary, mode: FeatureMode) -> &Path {
        let files = match vocabulary {
            Vocabulary::Letters => &self.letters,
            Vocabulary::Numbers => &self.numbers,
            Vocabulary::Words => &self.words,
        };
        match mode {
            FeatureMode::Full => &files.complex,
            FeatureMode::Lightweight => &files.simple,
        }
    }

    /// Joins a configured path onto `models_dir` unless it is already absolute.
    pub fn resolve(models_dir: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            models_dir.join(path)
        }
    }
}

/// Contents of the optional `--config` JSON file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub models: ModelPaths,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PipelineError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|reason| PipelineError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }
}
