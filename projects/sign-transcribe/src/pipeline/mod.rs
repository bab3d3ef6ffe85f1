// Video-to-label pipeline stages

pub mod features;
pub mod mask;
pub mod motion;
pub mod orchestrator;
pub mod salience;
pub mod sentence;
pub mod sequence;
pub mod types;
