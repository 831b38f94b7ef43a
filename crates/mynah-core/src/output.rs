use crate::Result;
use std::path::{Path, PathBuf};

/// Derive the output file for a new recording: `{dir}/{room}-{millis}.mp4`.
///
/// The millisecond timestamp keys the file to this dispatch, so re-recording
/// the same room never collides with an earlier artifact. Creates the output
/// directory if it does not exist yet.
pub fn recording_path(dir: &Path, room: &str) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }

    let stamp = chrono::Utc::now().timestamp_millis();
    Ok(dir.join(format!("{}-{}.mp4", room, stamp)))
}
