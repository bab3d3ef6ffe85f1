use crate::models::HandDetector;
use crate::pipeline::types::HandLandmarks;
use crate::video::Frame;

/// Keeps frames whose hand pose moved enough since the last kept frame.
pub struct SalienceSelector {
    distance_threshold: f32,
    max_frames: usize,
}

impl SalienceSelector {
    pub fn new(distance_threshold: f32, max_frames: usize) -> Self {
        Self {
            distance_threshold,
            max_frames,
        }
    }

    /// Returns at most `max_frames` salient frames in their original order.
    ///
    /// Frames without a detected hand are never kept; an empty result means
    /// the input had no usable content.
    pub fn select<'a>(&self, frames: &'a [Frame], detector: &dyn HandDetector) -> Vec<&'a Frame> {
        let mut retained = Vec::with_capacity(self.max_frames.min(frames.len()));
        let mut prev_landmarks: Option<HandLandmarks> = None;

        for frame in frames {
            if retained.len() >= self.max_frames {
                break;
            }

            let landmarks = match detector.detect(&frame.image) {
                Ok(hands) => hands.into_iter().next().map(|h| h.landmarks),
                Err(e) => {
                    tracing::warn!("Hand detection failed on frame {}: {:#}", frame.index, e);
                    None
                }
            };
            let Some(landmarks) = landmarks else {
                continue;
            };

            let salient = match &prev_landmarks {
                None => true,
                Some(prev) => landmarks.distance(prev) > self.distance_threshold,
            };
            tracing::debug!("frame {} salient={}", frame.index, salient);

            if salient {
                retained.push(frame);
                prev_landmarks = Some(landmarks);
            }
        }

        retained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{HandObservation, HandSide, Point, LANDMARK_COUNT};
    use anyhow::anyhow;
    use opencv::core::{Mat, Scalar, CV_8UC3};
    use opencv::prelude::*;

    /// Reads the frame index from the top-left pixel and looks up a scripted
    /// hand offset for it; `None` means no hand.
    struct ScriptedDetector {
        offsets: Vec<Option<f32>>,
    }

    impl HandDetector for ScriptedDetector {
        fn detect(&self, image: &Mat) -> anyhow::Result<Vec<HandObservation>> {
            let index = image.at_2d::<opencv::core::Vec3b>(0, 0)?[0] as usize;
            match self.offsets.get(index).copied().flatten() {
                Some(offset) if offset < 0.0 => Err(anyhow!("detector crashed")),
                Some(offset) => Ok(vec![HandObservation {
                    side: HandSide::Right,
                    landmarks: HandLandmarks::new(
                        (0..LANDMARK_COUNT)
                            .map(|_| Point { x: offset, y: 0.5 })
                            .collect(),
                    ),
                }]),
                None => Ok(Vec::new()),
            }
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|index| Frame {
                index,
                image: Mat::new_rows_cols_with_default(2, 2, CV_8UC3, Scalar::all(index as f64))
                    .unwrap(),
            })
            .collect()
    }

    fn indices(selected: &[&Frame]) -> Vec<usize> {
        selected.iter().map(|f| f.index).collect()
    }

    #[test]
    fn test_small_moves_are_skipped() {
        // Per-point shift of 0.005 moves the flattened vector by ~0.023 (< 0.05).
        let detector = ScriptedDetector {
            offsets: vec![Some(0.1), Some(0.105), Some(0.2), Some(0.2), Some(0.3)],
        };
        let all = frames(5);
        let selected = SalienceSelector::new(0.05, 10).select(&all, &detector);
        assert_eq!(indices(&selected), vec![0, 2, 4]);
    }

    #[test]
    fn test_distance_is_measured_from_last_kept_frame() {
        // Each step is small, but they accumulate past the threshold.
        let detector = ScriptedDetector {
            offsets: vec![Some(0.1), Some(0.105), Some(0.11), Some(0.115)],
        };
        let all = frames(4);
        let selected = SalienceSelector::new(0.05, 10).select(&all, &detector);
        assert_eq!(indices(&selected), vec![0, 3]);
    }

    #[test]
    fn test_cap_on_retained_frames() {
        let detector = ScriptedDetector {
            offsets: (0..15).map(|i| Some(i as f32 * 0.1)).collect(),
        };
        let all = frames(15);
        let selected = SalienceSelector::new(0.05, 10).select(&all, &detector);
        assert_eq!(selected.len(), 10);
        assert_eq!(indices(&selected), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_no_hands_gives_empty_selection() {
        let detector = ScriptedDetector {
            offsets: vec![None; 6],
        };
        let all = frames(6);
        assert!(SalienceSelector::new(0.05, 10)
            .select(&all, &detector)
            .is_empty());
    }

    #[test]
    fn test_detector_errors_count_as_no_hand() {
        let detector = ScriptedDetector {
            offsets: vec![Some(-1.0), Some(0.2), None, Some(0.6)],
        };
        let all = frames(4);
        let selected = SalienceSelector::new(0.05, 10).select(&all, &detector);
        assert_eq!(indices(&selected), vec![1, 3]);
    }
}
