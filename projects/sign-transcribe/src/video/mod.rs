pub mod frame_store;
pub mod opencv_reader;

use anyhow::Result;
use opencv::core::Mat;

pub use frame_store::{Frame, FrameStore};

pub trait VideoReader: Send {
    /// Frame count reported by the container; may be an estimate.
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    /// Next decoded frame, or `None` at end of stream.
    fn read_frame(&mut self) -> Result<Option<Mat>>;
}
