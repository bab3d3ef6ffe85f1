use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of keypoints the landmark detector reports per hand.
pub const LANDMARK_COUNT: usize = 21;

/// A 2D point in normalized image coordinates [0, 1]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandSide {
    Left,
    Right,
}

impl HandSide {
    pub fn as_str(self) -> &'static str {
        match self {
            HandSide::Left => "left",
            HandSide::Right => "right",
        }
    }
}

/// Keypoints of one detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    pub points: Vec<Point>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Euclidean distance between the two keypoint sets flattened to vectors.
    pub fn distance(&self, other: &HandLandmarks) -> f32 {
        self.points
            .iter()
            .zip(other.points.iter())
            .map(|(a, b)| (a.x - b.x).powi(2) + (a.y - b.y).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One hand reported by the landmark detector.
#[derive(Debug, Clone)]
pub struct HandObservation {
    pub side: HandSide,
    pub landmarks: HandLandmarks,
}

/// A contiguous frame range `[start, end)` attributed to one gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureSegment {
    pub start: usize,
    pub end: usize,
}

impl GestureSegment {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Features of one retained frame, both hands combined.
#[derive(Debug, Clone, PartialEq)]
pub struct PerFrameFeature {
    /// Left then right embedding, `2 * embedding_dim` values.
    pub embedding: Vec<f32>,
    /// Left then right shape descriptors, `2 * diagrams_per_hand` rows.
    /// `None` in lightweight mode.
    pub descriptors: Option<Vec<Vec<f32>>>,
}

/// Classifier verdict for one feature sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// A segment prediction that made it into the sentence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentResult {
    pub segment: usize,
    pub label: String,
    pub confidence: f32,
}

/// Which feature set feeds the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum FeatureMode {
    /// Embeddings plus shape descriptors (dual-stream classifier).
    #[serde(rename = "complex")]
    #[value(name = "complex")]
    Full,
    /// Embeddings only (single-stream classifier).
    #[serde(rename = "simple")]
    #[value(name = "simple")]
    Lightweight,
}

impl FeatureMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FeatureMode::Full => "complex",
            FeatureMode::Lightweight => "simple",
        }
    }
}

impl fmt::Display for FeatureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a clip holds one sign or a continuous run of signs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SequenceType {
    Single,
    Sequence,
}

impl SequenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SequenceType::Single => "single",
            SequenceType::Sequence => "sequence",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(offset: f32) -> HandLandmarks {
        HandLandmarks::new(
            (0..LANDMARK_COUNT)
                .map(|i| Point {
                    x: i as f32 * 0.01 + offset,
                    y: 0.5,
                })
                .collect(),
        )
    }

    #[test]
    fn test_landmark_distance() {
        let a = hand(0.0);
        assert_eq!(a.distance(&a), 0.0);

        // Shifting every x by 0.01 moves the flattened vector by 0.01 * sqrt(21).
        let b = hand(0.01);
        let expected = 0.01 * (LANDMARK_COUNT as f32).sqrt();
        assert!((a.distance(&b) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_segment_len() {
        let seg = GestureSegment { start: 3, end: 7 };
        assert_eq!(seg.len(), 4);
        assert!(GestureSegment { start: 5, end: 5 }.is_empty());
    }
}
