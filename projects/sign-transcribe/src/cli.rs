use clap::Parser;
use sign_transcribe::pipeline::types::{FeatureMode, SequenceType};
use sign_transcribe::Request;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video clip to transcribe
    #[arg(long)]
    pub video: PathBuf,

    /// Vocabulary: 1 = letters, 2 = numbers, 3 = words
    #[arg(long, default_value_t = 3)]
    pub model_type: u8,

    /// Feature set fed to the classifier
    #[arg(long, value_enum, default_value_t = FeatureMode::Full)]
    pub mode: FeatureMode,

    /// One sign per clip, or a continuous run of signs
    #[arg(long, value_enum, default_value_t = SequenceType::Single)]
    pub seq_type: SequenceType,

    /// Directory holding the ONNX models
    #[arg(long, env = "SIGN_TRANSCRIBE_MODELS_DIR", default_value = "models")]
    pub models_dir: PathBuf,

    /// Size-function executable (overrides the configured path)
    #[arg(long, env = "SIGN_TRANSCRIBE_SIZE_FUNCTION")]
    pub size_function: Option<PathBuf>,

    /// JSON file with pipeline settings and model paths
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Show a decoding progress bar
    #[arg(long)]
    pub progress: bool,

    /// Log per-frame detail
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn request(&self) -> Request {
        Request {
            model_type: self.model_type,
            mode: self.mode,
            seq_type: self.seq_type,
        }
    }
}
