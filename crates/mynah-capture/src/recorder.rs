use crate::{Error, Result};
use mynah_core::RecorderConfig;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Spawns the ffmpeg pipeline that grabs the virtual display and the pulse
/// monitor sink.
///
/// Encoding choices: fixed 30 fps (an X11 grab delivers frames irregularly,
/// and a variable rate makes playback jitter), `superfast` + CRF 18 for
/// near-lossless text at a bounded CPU cost, and `zerolatency` tuning since
/// this is a live encode, not a batch job. The output file's validity is
/// ffmpeg's contract; the recorder never reads it back.
pub struct FfmpegRecorder {
    config: RecorderConfig,
}

impl FfmpegRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    /// Start a capture of the X display `display_id` into `output`.
    pub fn start(&self, display_id: &str, output: &Path) -> Result<CaptureJob> {
        let binary = self.locate_binary()?;
        let args = self.build_args(display_id, output);

        tracing::info!("Starting capture of {} into {}", display_id, output.display());
        let child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::Launch(format!("Failed to spawn {}: {}", binary.display(), e))
            })?;

        Ok(CaptureJob {
            child,
            output: output.to_path_buf(),
            stopped: false,
        })
    }

    fn locate_binary(&self) -> Result<PathBuf> {
        match &self.config.ffmpeg_path {
            Some(path) => Ok(path.clone()),
            None => which::which("ffmpeg").map_err(|e| {
                Error::Launch(format!(
                    "ffmpeg not found on PATH ({}); use --ffmpeg-path to point at the binary",
                    e
                ))
            }),
        }
    }

    /// Build the ffmpeg argument list.
    fn build_args(&self, display_id: &str, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-f".to_string(),
            "x11grab".to_string(),
            "-draw_mouse".to_string(),
            "0".to_string(),
            "-framerate".to_string(),
            self.config.framerate.to_string(),
            "-s".to_string(),
            self.config.resolution(),
            "-i".to_string(),
            display_id.to_string(),
            "-f".to_string(),
            "pulse".to_string(),
            "-i".to_string(),
            self.config.audio_source(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "superfast".to_string(),
            "-crf".to_string(),
            "18".to_string(),
            "-tune".to_string(),
            "zerolatency".to_string(),
            "-profile:v".to_string(),
            "high".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            output.display().to_string(),
        ]
    }
}

/// One running capture process bound to an output file.
pub struct CaptureJob {
    child: Child,
    output: PathBuf,
    stopped: bool,
}

impl CaptureJob {
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Health probe: has the encoder exited on its own?
    pub fn is_running(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::warn!("Capture process exited on its own: {}", status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::warn!("Could not probe capture process: {}", e);
                false
            }
        }
    }

    /// Stop the capture gracefully. SIGINT rather than a hard kill, so
    /// ffmpeg flushes trailing frames and writes the moov atom; the file is
    /// unplayable otherwise. Idempotent.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Ok(Some(status)) = self.child.try_wait() {
            tracing::debug!("Capture already exited ({}) before stop", status);
            return;
        }

        tracing::info!("Stopping capture (pid {})", self.child.id());
        interrupt_pid(self.child.id());

        // Give the encoder time to finalize the container.
        for _ in 0..25 {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::debug!("Capture exited: {}", status);
                    return;
                }
                Ok(None) => tokio::time::sleep(Duration::from_millis(200)).await,
                Err(e) => {
                    tracing::warn!("Could not reap capture process: {}", e);
                    return;
                }
            }
        }

        tracing::warn!("Capture ignored SIGINT; killing it (file may be truncated)");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Graceful interrupt (SIGINT on unix); the encoder treats it as "finish
/// the file and exit".
fn interrupt_pid(pid: u32) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill")
            .args(["-INT", &pid.to_string()])
            .output();
    }

    #[cfg(windows)]
    {
        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .output();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mynah_core::RecorderConfig;

    #[test]
    fn test_args_carry_configured_geometry() {
        let recorder = FfmpegRecorder::new(RecorderConfig::default());
        let args = recorder.build_args(":1", Path::new("/tmp/out.mp4"));

        // Capture geometry comes from the same config field as the browser
        // window size; both must agree.
        let s_pos = args.iter().position(|a| a == "-s").unwrap();
        assert_eq!(args[s_pos + 1], "1920x1080");

        let rate_pos = args.iter().position(|a| a == "-framerate").unwrap();
        assert_eq!(args[rate_pos + 1], "30");
    }

    #[test]
    fn test_args_read_display_and_sink_monitor() {
        let recorder = FfmpegRecorder::new(RecorderConfig::default());
        let args = recorder.build_args(":42", Path::new("/tmp/out.mp4"));

        assert!(args.contains(&":42".to_string()));
        assert!(args.contains(&"MynahSink.monitor".to_string()));
        assert!(args.contains(&"x11grab".to_string()));
        assert!(args.contains(&"pulse".to_string()));
    }

    #[test]
    fn test_output_path_is_last_arg() {
        let recorder = FfmpegRecorder::new(RecorderConfig::default());
        let args = recorder.build_args(":1", Path::new("/tmp/standup-123.mp4"));
        assert_eq!(args.last().unwrap(), "/tmp/standup-123.mp4");
    }

    #[test]
    fn test_start_fails_when_binary_missing() {
        let config = RecorderConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            ..Default::default()
        };
        let recorder = FfmpegRecorder::new(config);

        let err = recorder
            .start(":1", Path::new("/tmp/out.mp4"))
            .err()
            .expect("spawn of a missing binary must fail");
        assert!(matches!(err, Error::Launch(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_reports_display_and_output() {
        let config = RecorderConfig {
            ffmpeg_path: Some(PathBuf::from("/bin/true")),
            ..Default::default()
        };
        let recorder = FfmpegRecorder::new(config);

        let mut job = recorder
            .start(":9", Path::new("/tmp/town-hall-1.mp4"))
            .unwrap();
        assert_eq!(job.output(), Path::new("/tmp/town-hall-1.mp4"));
        job.stop().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_is_idempotent() {
        // `true` ignores the ffmpeg arguments and exits immediately, which
        // is exactly the shape of a capture process that is already gone.
        let config = RecorderConfig {
            ffmpeg_path: Some(PathBuf::from("/bin/true")),
            ..Default::default()
        };
        let recorder = FfmpegRecorder::new(config);
        let mut job = recorder.start(":1", Path::new("/tmp/out.mp4")).unwrap();

        job.stop().await;
        job.stop().await;
        assert!(!job.is_running());
    }
}
