// ONNX Runtime backed collaborators.

use super::{ClassifierInput, Embedder, HandDetector, SequenceClassifier};
use crate::pipeline::types::{HandLandmarks, HandObservation, HandSide, Point, LANDMARK_COUNT};
use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;

/// Side length of the square input both image models expect.
const IMAGE_INPUT_SIZE: i32 = 224;

/// A loaded session plus its IO names.
///
/// `Session::run` needs exclusive access, so concurrent requests take turns.
struct OnnxModel {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxModel {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("model file not found: {:?}", path));
        }
        let session = Session::builder()?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load ONNX model at {:?}", path))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if input_names.is_empty() {
            return Err(anyhow!("model {:?} declares no inputs", path));
        }
        if output_names.is_empty() {
            return Err(anyhow!("model {:?} declares no outputs", path));
        }

        tracing::info!(
            "Loaded ONNX model {:?} (inputs={:?}, outputs={:?})",
            path,
            input_names,
            output_names
        );

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
        })
    }

    /// Runs the model and returns every output flattened, in declaration order.
    fn run(&self, inputs: Vec<Tensor<f32>>) -> Result<Vec<Vec<f32>>> {
        if inputs.len() > self.input_names.len() {
            return Err(anyhow!(
                "model takes {} inputs, got {}",
                self.input_names.len(),
                inputs.len()
            ));
        }
        let named: Vec<(String, Tensor<f32>)> = self
            .input_names
            .iter()
            .cloned()
            .zip(inputs)
            .collect();

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Mutex poisoned"))?;
        let outputs = session.run(named)?;

        let mut flattened = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let (_shape, data) = outputs[name.as_str()].try_extract_tensor::<f32>()?;
            flattened.push(data.to_vec());
        }
        Ok(flattened)
    }
}

/// Resizes `image` to the model input and returns RGB pixels as NHWC floats.
fn image_to_nhwc(image: &Mat, scale: f32) -> Result<Vec<f32>> {
    let mut rgb = Mat::default();
    let code = match image.channels() {
        1 => imgproc::COLOR_GRAY2RGB,
        3 => imgproc::COLOR_BGR2RGB,
        4 => imgproc::COLOR_BGRA2RGB,
        n => return Err(anyhow!("unsupported channel count {}", n)),
    };
    imgproc::cvt_color_def(image, &mut rgb, code)?;

    let mut resized = Mat::default();
    imgproc::resize(
        &rgb,
        &mut resized,
        Size::new(IMAGE_INPUT_SIZE, IMAGE_INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    if !resized.is_continuous() {
        return Err(anyhow!("Mat is not continuous"));
    }
    Ok(resized
        .data_bytes()?
        .iter()
        .map(|&b| b as f32 * scale)
        .collect())
}

fn image_shape() -> Vec<usize> {
    let side = IMAGE_INPUT_SIZE as usize;
    vec![1, side, side, 3]
}

/// EfficientNet-style embedding model: 224x224 RGB in [0, 255], pooled vector out.
pub struct OnnxEmbedder {
    model: OnnxModel,
    dim: usize,
}

impl OnnxEmbedder {
    pub fn new(model_path: &Path, dim: usize) -> Result<Self> {
        Ok(Self {
            model: OnnxModel::load(model_path)?,
            dim,
        })
    }

    fn try_embed(&self, image: &Mat) -> Result<Vec<f32>> {
        let pixels = image_to_nhwc(image, 1.0)?;
        let tensor = Tensor::from_array((image_shape(), pixels))?;
        let mut outputs = self.model.run(vec![tensor])?;
        let features = outputs.swap_remove(0);
        if features.len() != self.dim {
            return Err(anyhow!(
                "embedding has {} values, expected {}",
                features.len(),
                self.dim
            ));
        }
        Ok(features)
    }
}

impl Embedder for OnnxEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, image: &Mat) -> Vec<f32> {
        match self.try_embed(image) {
            Ok(features) => features,
            Err(e) => {
                tracing::warn!("Embedding failed, using zero vector: {:#}", e);
                vec![0.0; self.dim]
            }
        }
    }
}

/// Single-hand landmark model (MediaPipe hand_landmark layout).
///
/// Outputs, in order: 21x3 landmarks in input pixels, hand presence score,
/// handedness score (> 0.5 means right).
pub struct OnnxHandLandmarker {
    model: OnnxModel,
    min_presence: f32,
}

impl OnnxHandLandmarker {
    pub fn new(model_path: &Path) -> Result<Self> {
        Ok(Self {
            model: OnnxModel::load(model_path)?,
            min_presence: 0.5,
        })
    }
}

impl HandDetector for OnnxHandLandmarker {
    fn detect(&self, image: &Mat) -> Result<Vec<HandObservation>> {
        let pixels = image_to_nhwc(image, 1.0 / 255.0)?;
        let tensor = Tensor::from_array((image_shape(), pixels))?;
        let outputs = self.model.run(vec![tensor])?;
        if outputs.len() < 3 {
            return Err(anyhow!(
                "hand landmark model returned {} outputs, expected 3",
                outputs.len()
            ));
        }

        let presence = outputs[1].first().copied().unwrap_or(0.0);
        if presence < self.min_presence {
            return Ok(Vec::new());
        }

        let coords = &outputs[0];
        if coords.len() < LANDMARK_COUNT * 3 {
            return Err(anyhow!("landmark tensor has {} values", coords.len()));
        }
        let side_len = IMAGE_INPUT_SIZE as f32;
        let points = coords
            .chunks_exact(3)
            .take(LANDMARK_COUNT)
            .map(|c| Point {
                x: c[0] / side_len,
                y: c[1] / side_len,
            })
            .collect();

        let side = if outputs[2].first().copied().unwrap_or(0.0) > 0.5 {
            HandSide::Right
        } else {
            HandSide::Left
        };

        Ok(vec![HandObservation {
            side,
            landmarks: HandLandmarks::new(points),
        }])
    }
}

/// Sequence classifier; dual-stream models take a second descriptor input.
pub struct OnnxSequenceClassifier {
    model: OnnxModel,
}

impl OnnxSequenceClassifier {
    pub fn new(model_path: &Path) -> Result<Self> {
        Ok(Self {
            model: OnnxModel::load(model_path)?,
        })
    }
}

/// Flattens equally sized rows, rejecting ragged input.
fn flatten_rows(rows: &[Vec<f32>]) -> Result<(usize, Vec<f32>)> {
    let width = rows.first().map(Vec::len).unwrap_or(0);
    let mut data = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            return Err(anyhow!("ragged rows: {} vs {}", row.len(), width));
        }
        data.extend_from_slice(row);
    }
    Ok((width, data))
}

impl SequenceClassifier for OnnxSequenceClassifier {
    fn predict(&self, input: &ClassifierInput<'_>) -> Result<Vec<f32>> {
        let steps = input.embeddings.len();
        let (width, data) = flatten_rows(input.embeddings)?;
        let mut tensors = vec![Tensor::from_array((vec![1, steps, width], data))?];

        if let Some(descriptors) = input.descriptors {
            let rows = descriptors.first().map(Vec::len).unwrap_or(0);
            let mut all = Vec::new();
            let mut dim = 0;
            for matrix in descriptors {
                if matrix.len() != rows {
                    return Err(anyhow!("ragged descriptor matrices"));
                }
                let (d, flat) = flatten_rows(matrix)?;
                dim = d;
                all.extend(flat);
            }
            tensors.push(Tensor::from_array((vec![1, descriptors.len(), rows, dim], all))?);
        }

        let mut outputs = self.model.run(tensors)?;
        Ok(outputs.swap_remove(0))
    }
}
