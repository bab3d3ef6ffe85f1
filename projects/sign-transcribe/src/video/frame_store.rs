use crate::error::{PipelineError, Result};
use crate::pipeline::types::GestureSegment;
use crate::video::{opencv_reader::OpencvReader, VideoReader};
use indicatif::{ProgressBar, ProgressStyle};
use opencv::core::Mat;
use std::path::Path;
use std::time::Instant;

/// A decoded frame tagged with its capture index.
pub struct Frame {
    pub index: usize,
    pub image: Mat,
}

/// All frames of one clip, in capture order.
///
/// Owned by a single request and dropped with it.
pub struct FrameStore {
    frames: Vec<Frame>,
    source_fps: f64,
}

impl FrameStore {
    /// Decodes every frame of `path`.
    ///
    /// Fails with [`PipelineError::Decode`] when the source cannot be opened or
    /// a read error interrupts decoding. A clip with no frames is not an error.
    pub fn decode(path: &Path, show_progress: bool) -> Result<Self> {
        let decode_err = |reason: String| PipelineError::Decode {
            path: path.to_path_buf(),
            reason,
        };
        let path_str = path
            .to_str()
            .ok_or_else(|| decode_err("path is not valid UTF-8".to_string()))?;

        let mut reader = OpencvReader::new(path_str).map_err(|e| decode_err(format!("{:#}", e)))?;
        Self::read_all(&mut reader, show_progress).map_err(|e| decode_err(format!("{:#}", e)))
    }

    fn read_all(reader: &mut dyn VideoReader, show_progress: bool) -> anyhow::Result<Self> {
        let start = Instant::now();
        let expected = reader.frame_count()?;
        let source_fps = reader.source_fps()?;

        let pb = if show_progress {
            let pb = ProgressBar::new(expected as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} fps, {eta})")?
                    .progress_chars("#>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut frames = Vec::with_capacity(expected);
        while let Some(image) = reader.read_frame()? {
            frames.push(Frame {
                index: frames.len(),
                image,
            });
            pb.inc(1);
        }
        pb.finish_and_clear();

        tracing::info!(
            "Decoded {} frames in {:.2}s",
            frames.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(Self { frames, source_fps })
    }

    /// Wraps already-decoded images, indexing them in order.
    pub fn from_images(images: Vec<Mat>, source_fps: f64) -> Self {
        let frames = images
            .into_iter()
            .enumerate()
            .map(|(index, image)| Frame { index, image })
            .collect();
        Self { frames, source_fps }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn source_fps(&self) -> f64 {
        self.source_fps
    }

    /// Frames belonging to `segment`, clamped to the clip.
    pub fn segment(&self, segment: GestureSegment) -> &[Frame] {
        let end = segment.end.min(self.frames.len());
        let start = segment.start.min(end);
        &self.frames[start..end]
    }
}
