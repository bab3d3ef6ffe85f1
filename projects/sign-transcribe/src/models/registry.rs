use super::{OnnxSequenceClassifier, SequenceClassifier};
use crate::config::ModelPaths;
use crate::error::{PipelineError, Result};
use crate::labels::Vocabulary;
use crate::pipeline::types::FeatureMode;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Classifiers keyed by vocabulary and feature mode.
///
/// Built once before any request is served and only read afterwards.
#[derive(Default)]
pub struct ModelRegistry {
    classifiers: HashMap<(Vocabulary, FeatureMode), Arc<dyn SequenceClassifier>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        vocabulary: Vocabulary,
        mode: FeatureMode,
        classifier: Arc<dyn SequenceClassifier>,
    ) {
        self.classifiers.insert((vocabulary, mode), classifier);
    }

    /// Loads the ONNX classifier for every requested pair. A file that is
    /// missing or unreadable aborts the load with [`PipelineError::ModelLoad`].
    pub fn load(
        paths: &ModelPaths,
        models_dir: &Path,
        selection: &[(Vocabulary, FeatureMode)],
    ) -> Result<Self> {
        let mut registry = Self::new();
        for &(vocabulary, mode) in selection {
            let path = ModelPaths::resolve(models_dir, paths.classifier(vocabulary, mode));
            tracing::info!("Loading {} {} classifier from {:?}", vocabulary, mode, path);
            let classifier = OnnxSequenceClassifier::new(&path)
                .map_err(|source| PipelineError::ModelLoad { path, source })?;
            registry.insert(vocabulary, mode, Arc::new(classifier));
        }
        Ok(registry)
    }

    pub fn get(
        &self,
        vocabulary: Vocabulary,
        mode: FeatureMode,
    ) -> Result<Arc<dyn SequenceClassifier>> {
        self.classifiers
            .get(&(vocabulary, mode))
            .cloned()
            .ok_or(PipelineError::ModelNotLoaded { vocabulary, mode })
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }
}
