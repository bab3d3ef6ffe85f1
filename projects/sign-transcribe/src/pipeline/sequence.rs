use crate::error::{PipelineError, Result};
use crate::labels::Vocabulary;
use crate::models::{ClassifierInput, SequenceClassifier};
use crate::pipeline::types::{FeatureMode, PerFrameFeature, Prediction};
use anyhow::anyhow;

/// Brings a non-empty sequence to exactly `target` elements: shorter input is
/// extended by repeating its last element, longer input is truncated.
pub fn pad_sequence<T: Clone>(items: &[T], target: usize) -> Result<Vec<T>> {
    let last = items.last().ok_or(PipelineError::EmptySequence)?;
    let mut padded: Vec<T> = items.iter().take(target).cloned().collect();
    padded.resize(target, last.clone());
    Ok(padded)
}

/// Index and value of the largest probability. Ties resolve to the lowest index.
/// Scores must be finite; callers reject NaN before asking.
pub fn argmax(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probabilities.iter().enumerate() {
        match best {
            Some((_, b)) if p <= b => {}
            _ => best = Some((i, p)),
        }
    }
    best
}

/// Pads a feature sequence and runs it through one vocabulary's classifier.
pub struct SequenceAssembler<'a> {
    vocabulary: Vocabulary,
    mode: FeatureMode,
    classifier: &'a dyn SequenceClassifier,
    max_seq_len: usize,
}

impl<'a> SequenceAssembler<'a> {
    pub fn new(
        vocabulary: Vocabulary,
        mode: FeatureMode,
        classifier: &'a dyn SequenceClassifier,
        max_seq_len: usize,
    ) -> Self {
        Self {
            vocabulary,
            mode,
            classifier,
            max_seq_len,
        }
    }

    /// Fails with [`PipelineError::EmptySequence`] without calling the
    /// classifier when `features` is empty.
    pub fn classify(&self, features: &[PerFrameFeature]) -> Result<Prediction> {
        let padded = pad_sequence(features, self.max_seq_len)?;

        let embeddings: Vec<Vec<f32>> = padded.iter().map(|f| f.embedding.clone()).collect();
        let descriptors = match self.mode {
            FeatureMode::Full => Some(
                padded
                    .iter()
                    .map(|f| {
                        f.descriptors.clone().ok_or_else(|| {
                            PipelineError::Inference(anyhow!(
                                "frame without shape descriptors in full mode"
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            FeatureMode::Lightweight => None,
        };

        let input = ClassifierInput {
            embeddings: &embeddings,
            descriptors: descriptors.as_deref(),
        };
        let probabilities = self
            .classifier
            .predict(&input)
            .map_err(PipelineError::Inference)?;
        if let Some(bad) = probabilities.iter().position(|p| !p.is_finite()) {
            return Err(PipelineError::Inference(anyhow!(
                "classifier score {} is {}",
                bad,
                probabilities[bad]
            )));
        }
        let (index, confidence) = argmax(&probabilities)
            .ok_or_else(|| PipelineError::Inference(anyhow!("classifier returned no scores")))?;

        let label = self.vocabulary.label(index).to_string();
        tracing::info!(
            "Predicted '{}' ({:.3}) from {} frames",
            label,
            confidence,
            features.len()
        );
        Ok(Prediction { label, confidence })
    }
}
