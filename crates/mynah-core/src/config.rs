use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Configuration for one recorder instance.
///
/// All the constants the controller needs live here so the browser window,
/// the CDP viewport override and the capture geometry are derived from a
/// single source. Defaults match the standard deployment: a Jitsi room on a
/// 1080p virtual display with a pulse monitor sink.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Base URL of the meeting service; the room name is appended as a path
    /// segment.
    pub base_url: String,

    /// Display name typed into the pre-join name field.
    pub display_name: String,

    /// Capture width in pixels. Must equal the browser window width.
    pub width: u32,

    /// Capture height in pixels. Must equal the browser window height.
    pub height: u32,

    /// Capture frame rate. Fixed rather than variable to avoid jitter from
    /// an irregular screen-grab source.
    pub framerate: u32,

    /// Directory recordings are written to, created on demand.
    pub output_dir: PathBuf,

    /// X display the capture reads from when `$DISPLAY` is unset.
    pub fallback_display: String,

    /// Pulse sink name; ffmpeg records from `{audio_sink}.monitor`.
    pub audio_sink: String,

    /// Literal substring that stops the session when seen in chat.
    pub stop_token: String,

    /// How often the in-page watcher scans the chat transcript.
    pub chat_poll_interval: Duration,

    /// Absolute session cap; the fail-safe against runaway sessions.
    pub max_duration: Duration,

    /// Upper bound on waiting for the pre-join UI to render, and the pause
    /// between joining and starting capture.
    pub settle_delay: Duration,

    /// Pause after submitting the display name.
    pub submit_delay: Duration,

    /// Explicit Chrome binary; `None` means platform discovery.
    pub chrome_path: Option<PathBuf>,

    /// Explicit ffmpeg binary; `None` means `$PATH` lookup.
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://meet.jit.si".to_string(),
            display_name: "Mynah Recorder".to_string(),
            width: 1920,
            height: 1080,
            framerate: 30,
            output_dir: PathBuf::from("./recordings"),
            fallback_display: ":1".to_string(),
            audio_sink: "MynahSink".to_string(),
            stop_token: "!stop".to_string(),
            chat_poll_interval: Duration::from_secs(2),
            max_duration: Duration::from_secs(60 * 120),
            settle_delay: Duration::from_secs(5),
            submit_delay: Duration::from_secs(2),
            chrome_path: None,
            ffmpeg_path: None,
        }
    }
}

impl RecorderConfig {
    /// Full URL for a room on the configured meeting service.
    pub fn meeting_url(&self, room: &str) -> Result<Url> {
        let joined = format!("{}/{}", self.base_url.trim_end_matches('/'), room);
        Url::parse(&joined).map_err(|e| Error::InvalidUrl(format!("{}: {}", joined, e)))
    }

    /// Geometry string shared by the browser window flag and the capture
    /// pipeline, e.g. `1920x1080`.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// X display to capture from: `$DISPLAY` when set, the configured
    /// fallback otherwise.
    pub fn display(&self) -> String {
        std::env::var("DISPLAY").unwrap_or_else(|_| self.fallback_display.clone())
    }

    /// Pulse source ffmpeg records audio from.
    pub fn audio_source(&self) -> String {
        format!("{}.monitor", self.audio_sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_1080p() {
        let config = RecorderConfig::default();
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.resolution(), "1920x1080");
        assert_eq!(config.framerate, 30);
    }

    #[test]
    fn test_meeting_url_appends_room() {
        let config = RecorderConfig::default();
        let url = config.meeting_url("standup").unwrap();
        assert_eq!(url.as_str(), "https://meet.jit.si/standup");
    }

    #[test]
    fn test_meeting_url_tolerates_trailing_slash() {
        let config = RecorderConfig {
            base_url: "https://meet.example.org/".to_string(),
            ..Default::default()
        };
        let url = config.meeting_url("town-hall").unwrap();
        assert_eq!(url.as_str(), "https://meet.example.org/town-hall");
    }

    #[test]
    fn test_audio_source_is_sink_monitor() {
        let config = RecorderConfig::default();
        assert_eq!(config.audio_source(), "MynahSink.monitor");
    }
}
