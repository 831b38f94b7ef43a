mod error;
mod recorder;

pub use error::{Error, Result};
pub use recorder::{CaptureJob, FfmpegRecorder};
