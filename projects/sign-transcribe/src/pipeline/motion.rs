// Motion-based gesture segmentation.
//
// A frame is "moving" when the mean dense optical-flow magnitude from its
// predecessor exceeds the threshold. Segment starts are the rising edges of
// that signal, armed by any single still frame.

use crate::config::FarnebackParams;
use crate::error::Result;
use crate::pipeline::types::GestureSegment;
use crate::video::Frame;
use opencv::core::{self, Mat, Vector};
use opencv::prelude::*;
use opencv::{imgproc, video};

pub struct MotionSegmenter {
    threshold: f64,
    params: FarnebackParams,
}

impl MotionSegmenter {
    pub fn new(threshold: f64, params: FarnebackParams) -> Self {
        Self { threshold, params }
    }

    /// Splits `frames` into contiguous gesture segments covering the clip.
    pub fn segment(&self, frames: &[Frame]) -> Result<Vec<GestureSegment>> {
        let scores = self.motion_scores(frames)?;
        let starts = gesture_starts(&scores, self.threshold);
        let segments = segments_from_starts(&starts, frames.len());
        tracing::info!(
            "Motion segmentation: {} frames -> {} segments (starts={:?})",
            frames.len(),
            segments.len(),
            starts
        );
        Ok(segments)
    }

    /// Mean Farneback flow magnitude per frame; the first frame scores 0.
    pub fn motion_scores(&self, frames: &[Frame]) -> Result<Vec<f64>> {
        let mut scores = Vec::with_capacity(frames.len());
        let mut prev_gray: Option<Mat> = None;

        for frame in frames {
            let gray = to_gray(&frame.image)?;
            let score = match &prev_gray {
                Some(prev) => self.flow_magnitude(prev, &gray)?,
                None => 0.0,
            };
            tracing::debug!("frame {} motion score {:.3}", frame.index, score);
            scores.push(score);
            prev_gray = Some(gray);
        }

        Ok(scores)
    }

    fn flow_magnitude(&self, prev: &Mat, next: &Mat) -> Result<f64> {
        let p = &self.params;
        let mut flow = Mat::default();
        video::calc_optical_flow_farneback(
            prev,
            next,
            &mut flow,
            p.pyr_scale,
            p.levels,
            p.winsize,
            p.iterations,
            p.poly_n,
            p.poly_sigma,
            p.flags,
        )?;

        let mut channels = Vector::<Mat>::new();
        core::split(&flow, &mut channels)?;
        let mut magnitude = Mat::default();
        let mut angle = Mat::default();
        core::cart_to_polar(
            &channels.get(0)?,
            &channels.get(1)?,
            &mut magnitude,
            &mut angle,
            false,
        )?;

        Ok(core::mean(&magnitude, &core::no_array())?[0])
    }
}

fn to_gray(image: &Mat) -> Result<Mat> {
    if image.channels() == 1 {
        return Ok(image.try_clone()?);
    }
    let mut gray = Mat::default();
    imgproc::cvt_color_def(image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

/// Frame indices where a gesture starts. Frame 0 always starts one; after
/// that, a moving frame starts a new gesture only if a still frame came
/// between it and the previous start.
pub fn gesture_starts(scores: &[f64], threshold: f64) -> Vec<usize> {
    let mut starts = vec![0];
    let mut start_detected = true;

    for (i, &score) in scores.iter().enumerate() {
        let moving = score > threshold;
        if moving && !start_detected {
            starts.push(i);
            start_detected = true;
        } else if !moving {
            start_detected = false;
        }
    }

    starts
}

/// Turns starts plus the end-of-clip sentinel into non-empty segments.
pub fn segments_from_starts(starts: &[usize], frame_count: usize) -> Vec<GestureSegment> {
    starts
        .iter()
        .copied()
        .chain(std::iter::once(frame_count))
        .collect::<Vec<_>>()
        .windows(2)
        .map(|w| GestureSegment {
            start: w[0],
            end: w[1],
        })
        .filter(|s| !s.is_empty())
        .collect()
}
