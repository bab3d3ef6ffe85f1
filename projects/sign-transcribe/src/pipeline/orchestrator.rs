// Pipeline orchestrator: runs one request from video to label.
//
// Each operation validates the vocabulary, picks the classifier, decodes the
// clip and then walks salience selection, feature extraction and sequence
// classification, once for the whole clip or once per motion segment.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::labels::Vocabulary;
use crate::models::{DiagramGenerator, Embedder, HandDetector, ModelRegistry, ShapeDescriptor};
use crate::pipeline::features::{HandFeatureExtractor, ShapeStage};
use crate::pipeline::motion::MotionSegmenter;
use crate::pipeline::salience::SalienceSelector;
use crate::pipeline::sentence::{Sentence, SentenceAssembler};
use crate::pipeline::sequence::SequenceAssembler;
use crate::pipeline::types::{FeatureMode, Prediction, SegmentResult, SequenceType};
use crate::scratch::Scratch;
use crate::video::FrameStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// External models shared read-only by every request.
#[derive(Clone)]
pub struct Collaborators {
    pub detector: Arc<dyn HandDetector>,
    pub embedder: Arc<dyn Embedder>,
    pub diagrams: Arc<dyn DiagramGenerator>,
    pub descriptor: Arc<dyn ShapeDescriptor>,
}

/// What the caller wants done with one clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub model_type: u8,
    pub mode: FeatureMode,
    pub seq_type: SequenceType,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            model_type: 3,
            mode: FeatureMode::Full,
            seq_type: SequenceType::Single,
        }
    }
}

impl Request {
    /// `"<mode>_<seq_type>"`, e.g. `complex_single`.
    pub fn mode_tag(&self) -> String {
        format!("{}_{}", self.mode.as_str(), self.seq_type.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub mode: String,
    pub model_type: u8,
    /// The label, or the space-joined sentence for sequence requests.
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentResult>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub mode: String,
    pub model_type: u8,
}

impl ErrorResponse {
    pub fn new(request: &Request, err: &PipelineError) -> Self {
        Self {
            error: err.to_string(),
            mode: request.mode_tag(),
            model_type: request.model_type,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    collaborators: Collaborators,
    registry: ModelRegistry,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, collaborators: Collaborators, registry: ModelRegistry) -> Self {
        Self {
            config,
            collaborators,
            registry,
            show_progress: false,
        }
    }

    /// Shows a progress bar while decoding.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Single label for the whole clip, using embeddings and shape descriptors.
    pub fn classify_clip(&self, video: &Path, model_type: u8) -> Result<String> {
        let vocabulary = Vocabulary::try_from(model_type)?;
        Ok(self.classify(video, vocabulary, FeatureMode::Full)?.label)
    }

    /// Sentence over the clip's motion segments, using embeddings and shape
    /// descriptors.
    pub fn classify_clip_sequence(&self, video: &Path, model_type: u8) -> Result<String> {
        Ok(self.transcribe_sequence(video, model_type, FeatureMode::Full)?.text)
    }

    /// Single label for the whole clip, using embeddings only.
    pub fn classify_clip_lightweight(&self, video: &Path, model_type: u8) -> Result<String> {
        let vocabulary = Vocabulary::try_from(model_type)?;
        Ok(self.classify(video, vocabulary, FeatureMode::Lightweight)?.label)
    }

    /// Sentence over the clip's motion segments, using embeddings only.
    pub fn classify_clip_sequence_lightweight(&self, video: &Path, model_type: u8) -> Result<String> {
        Ok(self
            .transcribe_sequence(video, model_type, FeatureMode::Lightweight)?
            .text)
    }

    /// Sentence plus the segment each kept label came from.
    pub fn transcribe_sequence(
        &self,
        video: &Path,
        model_type: u8,
        mode: FeatureMode,
    ) -> Result<Sentence> {
        let vocabulary = Vocabulary::try_from(model_type)?;
        self.transcribe(video, vocabulary, mode)
    }

    /// Dispatches a request. `model_type` is checked before the video is opened.
    pub fn handle(&self, video: &Path, request: &Request) -> Result<Response> {
        let vocabulary = Vocabulary::try_from(request.model_type)?;
        tracing::info!(
            "Request {} for {} ({:?})",
            request.mode_tag(),
            vocabulary,
            video
        );

        let (label, segments) = match request.seq_type {
            SequenceType::Single => (self.classify(video, vocabulary, request.mode)?.label, None),
            SequenceType::Sequence => {
                let sentence = self.transcribe(video, vocabulary, request.mode)?;
                (sentence.text, Some(sentence.segments))
            }
        };

        Ok(Response {
            mode: request.mode_tag(),
            model_type: request.model_type,
            label,
            segments,
        })
    }

    fn classify(&self, video: &Path, vocabulary: Vocabulary, mode: FeatureMode) -> Result<Prediction> {
        // Fail on a missing model before paying for decoding.
        self.registry.get(vocabulary, mode)?;
        with_scratch(|scratch| {
            let store = FrameStore::decode(video, self.show_progress)?;
            self.classify_frames(&store, vocabulary, mode, scratch)
        })
    }

    fn transcribe(&self, video: &Path, vocabulary: Vocabulary, mode: FeatureMode) -> Result<Sentence> {
        self.registry.get(vocabulary, mode)?;
        with_scratch(|scratch| {
            let store = FrameStore::decode(video, self.show_progress)?;
            self.transcribe_frames(&store, vocabulary, mode, scratch)
        })
    }

    /// Whole-clip classification over already decoded frames.
    ///
    /// Fails with [`PipelineError::EmptySequence`] when no frame survives
    /// salience selection and extraction.
    pub fn classify_frames(
        &self,
        store: &FrameStore,
        vocabulary: Vocabulary,
        mode: FeatureMode,
        scratch: &Scratch,
    ) -> Result<Prediction> {
        let start = Instant::now();
        let classifier = self.registry.get(vocabulary, mode)?;
        let assembler =
            SequenceAssembler::new(vocabulary, mode, classifier.as_ref(), self.config.max_seq_len);

        let salient = self.selector().select(store.frames(), self.collaborators.detector.as_ref());
        tracing::info!(
            "{} of {} frames salient ({:.2}s of video)",
            salient.len(),
            store.len(),
            store.len() as f64 / store.source_fps()
        );
        let features = self.extractor(mode).extract_all(&salient, 0, scratch);

        let prediction = assembler.classify(&features)?;
        tracing::info!("Clip classified in {:.2}s", start.elapsed().as_secs_f64());
        Ok(prediction)
    }

    /// Per-segment classification over already decoded frames. Segments with
    /// no usable frame contribute nothing; an empty sentence is a valid result.
    pub fn transcribe_frames(
        &self,
        store: &FrameStore,
        vocabulary: Vocabulary,
        mode: FeatureMode,
        scratch: &Scratch,
    ) -> Result<Sentence> {
        let start = Instant::now();
        let classifier = self.registry.get(vocabulary, mode)?;
        let assembler =
            SequenceAssembler::new(vocabulary, mode, classifier.as_ref(), self.config.max_seq_len);
        let segmenter = MotionSegmenter::new(self.config.motion_threshold, self.config.farneback);
        let selector = self.selector();
        let extractor = self.extractor(mode);
        let mut sentence = SentenceAssembler::new(self.config.confidence_threshold);

        for (i, segment) in segmenter.segment(store.frames())?.into_iter().enumerate() {
            let frames = store.segment(segment);
            let salient = selector.select(frames, self.collaborators.detector.as_ref());
            tracing::debug!(
                "Segment {} [{}, {}): {} salient frames",
                i,
                segment.start,
                segment.end,
                salient.len()
            );
            let features = extractor.extract_all(&salient, i, scratch);

            match assembler.classify(&features) {
                Ok(prediction) => {
                    sentence.push(i, prediction);
                }
                Err(PipelineError::EmptySequence) => {
                    tracing::info!("Segment {} has no usable frames", i);
                }
                Err(e) => return Err(e),
            }
        }

        let sentence = sentence.finish();
        tracing::info!(
            "Sentence '{}' from {} segments in {:.2}s",
            sentence.text,
            sentence.segments.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(sentence)
    }

    fn selector(&self) -> SalienceSelector {
        SalienceSelector::new(
            self.config.landmark_distance_threshold,
            self.config.max_salient_frames,
        )
    }

    fn extractor(&self, mode: FeatureMode) -> HandFeatureExtractor<'_> {
        let c = &self.collaborators;
        match mode {
            FeatureMode::Full => HandFeatureExtractor::full(
                &self.config,
                c.detector.as_ref(),
                c.embedder.as_ref(),
                ShapeStage {
                    generator: c.diagrams.as_ref(),
                    descriptor: c.descriptor.as_ref(),
                },
            ),
            FeatureMode::Lightweight => {
                HandFeatureExtractor::lightweight(&self.config, c.detector.as_ref(), c.embedder.as_ref())
            }
        }
    }
}

/// Runs `f` with a fresh scratch area that is removed whichever way `f` exits.
fn with_scratch<T>(f: impl FnOnce(&Scratch) -> Result<T>) -> Result<T> {
    let scratch = Scratch::new()?;
    let result = f(&scratch);
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        tracing::warn!("Failed to remove scratch area {:?}: {}", path, e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassifierInput;
    use crate::models::SequenceClassifier;
    use crate::pipeline::types::{HandLandmarks, HandObservation, HandSide, Point, LANDMARK_COUNT};
    use opencv::core::{Mat, Scalar, Vec3b, CV_8UC3};
    use opencv::prelude::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Left hand whose pose shifts with the frame's blue channel (mod 10), or no hand
    /// when `visible` is false.
    struct ShiftingDetector {
        visible: bool,
    }

    impl HandDetector for ShiftingDetector {
        fn detect(&self, image: &Mat) -> anyhow::Result<Vec<HandObservation>> {
            if !self.visible {
                return Ok(Vec::new());
            }
            let shift = (image.at_2d::<Vec3b>(0, 0)?[0] % 10) as f32 * 0.02;
            let points = (0..LANDMARK_COUNT)
                .map(|i| Point {
                    x: 0.2 + 0.02 * i as f32 + shift,
                    y: if i % 2 == 0 { 0.3 } else { 0.6 },
                })
                .collect();
            Ok(vec![HandObservation {
                side: HandSide::Left,
                landmarks: HandLandmarks::new(points),
            }])
        }
    }

    struct OnesEmbedder;

    impl Embedder for OnesEmbedder {
        fn dim(&self) -> usize {
            2
        }

        fn embed(&self, _image: &Mat) -> Vec<f32> {
            vec![1.0; 2]
        }
    }

    struct NoDiagrams;

    impl DiagramGenerator for NoDiagrams {
        fn diagrams(
            &self,
            _mask: &Mat,
            _angle: u32,
            _radius: u32,
            _workdir: &Path,
        ) -> anyhow::Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    struct ZeroDescriptor;

    impl ShapeDescriptor for ZeroDescriptor {
        fn dim(&self) -> usize {
            25
        }

        fn describe(&self, _diagram: &Path) -> Vec<f32> {
            vec![0.0; 25]
        }
    }

    struct Fixed {
        index: usize,
        confidence: f32,
        size: usize,
        calls: AtomicUsize,
    }

    impl SequenceClassifier for Fixed {
        fn predict(&self, input: &ClassifierInput<'_>) -> anyhow::Result<Vec<f32>> {
            assert_eq!(input.embeddings.len(), 10);
            self.calls.fetch_add(1, Ordering::Relaxed);
            let mut scores = vec![0.0; self.size];
            scores[self.index] = self.confidence;
            Ok(scores)
        }
    }

    /// Answers each call with the next scripted class index at 0.9.
    struct Scripted {
        indices: Vec<usize>,
        calls: AtomicUsize,
    }

    impl SequenceClassifier for Scripted {
        fn predict(&self, _input: &ClassifierInput<'_>) -> anyhow::Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed);
            let mut scores = vec![0.0; Vocabulary::Words.len()];
            scores[self.indices[call % self.indices.len()]] = 0.9;
            Ok(scores)
        }
    }

    fn pipeline(visible: bool, classifier: Arc<dyn SequenceClassifier>) -> Pipeline {
        let mut registry = ModelRegistry::new();
        registry.insert(Vocabulary::Words, FeatureMode::Full, classifier.clone());
        registry.insert(Vocabulary::Words, FeatureMode::Lightweight, classifier);
        Pipeline::new(
            PipelineConfig::default(),
            Collaborators {
                detector: Arc::new(ShiftingDetector { visible }),
                embedder: Arc::new(OnesEmbedder),
                diagrams: Arc::new(NoDiagrams),
                descriptor: Arc::new(ZeroDescriptor),
            },
            registry,
        )
    }

    fn words_classifier(index: usize, confidence: f32) -> Arc<Fixed> {
        Arc::new(Fixed {
            index,
            confidence,
            size: Vocabulary::Words.len(),
            calls: AtomicUsize::new(0),
        })
    }

    /// Constant frames tagged with their index in the blue channel.
    fn still_clip(n: usize) -> FrameStore {
        let images = (0..n)
            .map(|i| {
                let mut image =
                    Mat::new_rows_cols_with_default(48, 48, CV_8UC3, Scalar::all(90.0)).unwrap();
                *image.at_2d_mut::<Vec3b>(0, 0).unwrap() = Vec3b::from([i as u8, 90, 90]);
                image
            })
            .collect();
        FrameStore::from_images(images, 30.0)
    }

    /// Smooth texture panned right by `offset` pixels per frame.
    fn panning_clip(offsets: &[i32]) -> FrameStore {
        let period = 40.0;
        let images = offsets
            .iter()
            .map(|&offset| {
                let mut image =
                    Mat::new_rows_cols_with_default(128, 128, CV_8UC3, Scalar::all(0.0)).unwrap();
                for y in 0..128 {
                    for x in 0..128 {
                        let u = (x - offset) as f64 * std::f64::consts::TAU / period;
                        let v = y as f64 * std::f64::consts::TAU / period;
                        let value = (128.0 + 60.0 * u.sin() + 60.0 * v.sin()) as u8;
                        *image.at_2d_mut::<Vec3b>(y, x).unwrap() = Vec3b::from([value; 3]);
                    }
                }
                image
            })
            .collect();
        FrameStore::from_images(images, 30.0)
    }

    #[test]
    fn test_sentence_across_motion_segments() {
        // Two pans, each followed by still frames: segments start at 0, 3 and 6.
        let clip = panning_clip(&[0, 0, 0, 8, 8, 8, 16, 16, 16]);
        let classifier = Arc::new(Scripted {
            indices: vec![19, 19, 5],
            calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline(true, classifier.clone());
        let scratch = Scratch::new().unwrap();

        let sentence = pipeline
            .transcribe_frames(&clip, Vocabulary::Words, FeatureMode::Full, &scratch)
            .unwrap();

        assert_eq!(classifier.calls.load(Ordering::Relaxed), 3);
        assert_eq!(sentence.text, "سعيد يمشي");
        let kept: Vec<usize> = sentence.segments.iter().map(|s| s.segment).collect();
        assert_eq!(kept, vec![0, 2]);
        assert_eq!(scratch.live_dirs().unwrap(), 0);
    }

    #[test]
    fn test_single_clip_prediction() {
        let classifier = words_classifier(5, 0.9);
        let pipeline = pipeline(true, classifier.clone());
        let scratch = Scratch::new().unwrap();

        let prediction = pipeline
            .classify_frames(&still_clip(3), Vocabulary::Words, FeatureMode::Full, &scratch)
            .unwrap();

        assert_eq!(prediction.label, Vocabulary::Words.label(5));
        assert_eq!(classifier.calls.load(Ordering::Relaxed), 1);
        assert_eq!(scratch.live_dirs().unwrap(), 0);
    }

    #[test]
    fn test_zero_hands_single_mode_is_empty_sequence() {
        let classifier = words_classifier(5, 0.9);
        let pipeline = pipeline(false, classifier.clone());
        let scratch = Scratch::new().unwrap();

        let err = pipeline
            .classify_frames(&still_clip(4), Vocabulary::Words, FeatureMode::Full, &scratch)
            .unwrap_err();

        assert!(matches!(err, PipelineError::EmptySequence));
        assert_eq!(err.to_string(), "no valid frames");
        assert_eq!(classifier.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_zero_hands_sequence_mode_is_empty_sentence() {
        let classifier = words_classifier(5, 0.9);
        let pipeline = pipeline(false, classifier.clone());
        let scratch = Scratch::new().unwrap();

        let sentence = pipeline
            .transcribe_frames(
                &still_clip(4),
                Vocabulary::Words,
                FeatureMode::Lightweight,
                &scratch,
            )
            .unwrap();

        assert_eq!(sentence.text, "");
        assert!(sentence.segments.is_empty());
        assert_eq!(classifier.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_still_clip_is_one_segment_sentence() {
        let classifier = words_classifier(19, 0.8);
        let pipeline = pipeline(true, classifier.clone());
        let scratch = Scratch::new().unwrap();

        let sentence = pipeline
            .transcribe_frames(&still_clip(5), Vocabulary::Words, FeatureMode::Full, &scratch)
            .unwrap();

        assert_eq!(sentence.text, "سعيد");
        assert_eq!(sentence.segments[0].segment, 0);
        assert_eq!(classifier.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_low_confidence_sequence_is_empty() {
        let classifier = words_classifier(19, 0.5);
        let pipeline = pipeline(true, classifier);
        let scratch = Scratch::new().unwrap();

        let sentence = pipeline
            .transcribe_frames(&still_clip(2), Vocabulary::Words, FeatureMode::Full, &scratch)
            .unwrap();
        assert_eq!(sentence.text, "");
    }

    #[test]
    fn test_invalid_model_type_checked_before_video() {
        let pipeline = pipeline(true, words_classifier(0, 0.9));
        let request = Request {
            model_type: 9,
            ..Request::default()
        };

        let err = pipeline
            .handle(Path::new("/nonexistent/clip.mp4"), &request)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidModelType(9)));

        let err = pipeline
            .classify_clip_lightweight(Path::new("/nonexistent/clip.mp4"), 0)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidModelType(0)));
    }

    #[test]
    fn test_unloaded_model_checked_before_video() {
        let pipeline = pipeline(true, words_classifier(0, 0.9));
        let err = pipeline
            .classify_clip(Path::new("/nonexistent/clip.mp4"), 1)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ModelNotLoaded {
                vocabulary: Vocabulary::Letters,
                ..
            }
        ));
    }

    #[test]
    fn test_unreadable_video_is_decode_error() {
        let pipeline = pipeline(true, words_classifier(0, 0.9));
        let err = pipeline
            .classify_clip_sequence(Path::new("/nonexistent/clip.mp4"), 3)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_request_defaults_and_tags() {
        let request = Request::default();
        assert_eq!(request.model_type, 3);
        assert_eq!(request.mode_tag(), "complex_single");

        let request = Request {
            model_type: 2,
            mode: FeatureMode::Lightweight,
            seq_type: SequenceType::Sequence,
        };
        assert_eq!(request.mode_tag(), "simple_sequence");

        let error = ErrorResponse::new(&request, &PipelineError::EmptySequence);
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error"], "no valid frames");
        assert_eq!(json["mode"], "simple_sequence");
        assert_eq!(json["model_type"], 2);
    }

    #[test]
    fn test_single_response_omits_segments() {
        let response = Response {
            mode: "complex_single".to_string(),
            model_type: 3,
            label: "يمشي".to_string(),
            segments: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("segments").is_none());
        assert_eq!(json["label"], "يمشي");
    }

    #[test]
    fn test_scratch_removed_after_failure() {
        let mut seen = None;
        let result: Result<()> = with_scratch(|scratch| {
            seen = Some(scratch.path().to_path_buf());
            Err(PipelineError::EmptySequence)
        });
        assert!(result.is_err());
        assert!(!seen.unwrap().exists());
    }
}
