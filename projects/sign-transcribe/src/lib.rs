pub mod config;
pub mod error;
pub mod labels;
pub mod models;
pub mod pipeline;
pub mod scratch;
pub mod video;

pub use error::{PipelineError, Result};
pub use pipeline::orchestrator::{Collaborators, ErrorResponse, Pipeline, Request, Response};
