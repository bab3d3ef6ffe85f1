// Per-frame hand features.
//
// Each retained frame yields one `PerFrameFeature`: left and right embeddings
// side by side and, in full mode, `diagrams_per_hand` shape descriptors per
// side. A side without a detected hand contributes zeros.

use crate::config::PipelineConfig;
use crate::models::{DiagramGenerator, Embedder, HandDetector, ShapeDescriptor};
use crate::pipeline::mask::{is_blank, rasterize_hands, HandMasks};
use crate::pipeline::types::{HandSide, PerFrameFeature};
use crate::scratch::{ArtifactKey, Scratch};
use crate::video::Frame;
use anyhow::{anyhow, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use std::path::Path;

/// Diagram rendering plus description, used only in full mode.
pub struct ShapeStage<'a> {
    pub generator: &'a dyn DiagramGenerator,
    pub descriptor: &'a dyn ShapeDescriptor,
}

pub struct HandFeatureExtractor<'a> {
    detector: &'a dyn HandDetector,
    embedder: &'a dyn Embedder,
    shape: Option<ShapeStage<'a>>,
    upscale: f64,
    angle: u32,
    radius: u32,
    diagrams_per_hand: usize,
}

impl<'a> HandFeatureExtractor<'a> {
    /// Lightweight extractor: embeddings only.
    pub fn lightweight(
        config: &PipelineConfig,
        detector: &'a dyn HandDetector,
        embedder: &'a dyn Embedder,
    ) -> Self {
        Self {
            detector,
            embedder,
            shape: None,
            upscale: config.mask_upscale,
            angle: config.diagram_angle,
            radius: config.diagram_radius,
            diagrams_per_hand: config.diagrams_per_hand,
        }
    }

    /// Full extractor: embeddings plus shape descriptors.
    pub fn full(
        config: &PipelineConfig,
        detector: &'a dyn HandDetector,
        embedder: &'a dyn Embedder,
        shape: ShapeStage<'a>,
    ) -> Self {
        Self {
            shape: Some(shape),
            ..Self::lightweight(config, detector, embedder)
        }
    }

    /// Extracts features for every frame, in order. A frame whose extraction
    /// fails is logged and left out.
    pub fn extract_all(
        &self,
        frames: &[&Frame],
        segment: usize,
        scratch: &Scratch,
    ) -> Vec<PerFrameFeature> {
        let mut features = Vec::with_capacity(frames.len());
        for frame in frames {
            match self.extract_frame(frame, segment, scratch) {
                Ok(feature) => features.push(feature),
                Err(e) => {
                    tracing::warn!(
                        "Segment {}, frame {} skipped: {:#}",
                        segment,
                        frame.index,
                        e
                    );
                }
            }
        }
        features
    }

    pub fn extract_frame(
        &self,
        frame: &Frame,
        segment: usize,
        scratch: &Scratch,
    ) -> Result<PerFrameFeature> {
        let size = frame.image.size()?;
        let hands = self.detector.detect(&frame.image)?;
        let HandMasks { left, right } =
            rasterize_hands(&hands, size.width, size.height, self.upscale)?;

        let dim = self.embedder.dim();
        let mut embedding = Vec::with_capacity(2 * dim);
        let mut descriptors = Vec::with_capacity(2 * self.diagrams_per_hand);

        for (side, mask) in [(HandSide::Left, left), (HandSide::Right, right)] {
            let key = ArtifactKey::new(segment, frame.index, side);

            if is_blank(&mask)? {
                embedding.extend(std::iter::repeat(0.0).take(dim));
                if let Some(shape) = &self.shape {
                    descriptors.extend(self.zero_descriptors(shape));
                }
                continue;
            }

            if let Some(shape) = &self.shape {
                let workdir = scratch.dir_for(key)?;
                let described = self.describe_hand(shape, &mask, &workdir);
                if let Err(e) = scratch.release(key) {
                    tracing::warn!("Failed to release {:?}: {}", workdir, e);
                }
                descriptors.extend(described?);
            }

            let side_embedding = self.embedder.embed(&mask);
            if side_embedding.len() != dim {
                return Err(anyhow!(
                    "embedder returned {} values, expected {}",
                    side_embedding.len(),
                    dim
                ));
            }
            embedding.extend(side_embedding);
        }

        Ok(PerFrameFeature {
            embedding,
            descriptors: self.shape.is_some().then_some(descriptors),
        })
    }

    /// Renders and describes the diagrams of one hand mask, capped and
    /// zero-padded to `diagrams_per_hand` rows.
    fn describe_hand(
        &self,
        shape: &ShapeStage<'_>,
        mask: &Mat,
        workdir: &Path,
    ) -> Result<Vec<Vec<f32>>> {
        let files = shape
            .generator
            .diagrams(mask, self.angle, self.radius, workdir)?;
        tracing::debug!("{:?}: {} diagrams", workdir, files.len());

        let mut described: Vec<Vec<f32>> = files
            .iter()
            .take(self.diagrams_per_hand)
            .map(|path| shape.descriptor.describe(path))
            .collect();
        described.resize(self.diagrams_per_hand, vec![0.0; shape.descriptor.dim()]);
        Ok(described)
    }

    fn zero_descriptors(&self, shape: &ShapeStage<'_>) -> Vec<Vec<f32>> {
        vec![vec![0.0; shape.descriptor.dim()]; self.diagrams_per_hand]
    }
}
