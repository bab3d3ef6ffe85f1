use crate::pipeline::types::{Prediction, SegmentResult};
use serde::Serialize;

/// Labels kept from a multi-gesture clip, in segment order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sentence {
    pub text: String,
    pub segments: Vec<SegmentResult>,
}

/// Folds per-segment predictions into a sentence.
///
/// A prediction is kept only when it is confident enough and differs from the
/// label kept before it, so a sign held across two segments is reported once.
pub struct SentenceAssembler {
    confidence_threshold: f32,
    last_label: Option<String>,
    kept: Vec<SegmentResult>,
}

impl SentenceAssembler {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            last_label: None,
            kept: Vec::new(),
        }
    }

    /// Returns whether the prediction was kept.
    pub fn push(&mut self, segment: usize, prediction: Prediction) -> bool {
        if prediction.confidence < self.confidence_threshold {
            tracing::debug!(
                "Segment {} dropped: '{}' at {:.3}",
                segment,
                prediction.label,
                prediction.confidence
            );
            return false;
        }
        if self.last_label.as_deref() == Some(prediction.label.as_str()) {
            tracing::debug!("Segment {} repeats '{}'", segment, prediction.label);
            return false;
        }

        self.last_label = Some(prediction.label.clone());
        self.kept.push(SegmentResult {
            segment,
            label: prediction.label,
            confidence: prediction.confidence,
        });
        true
    }

    pub fn finish(self) -> Sentence {
        let text = self
            .kept
            .iter()
            .map(|s| s.label.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Sentence {
            text,
            segments: self.kept,
        }
    }
}
