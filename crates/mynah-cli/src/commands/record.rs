use anyhow::{bail, Context, Result};
use mynah_browser::{JoinNegotiator, Session, StopWatcher};
use mynah_capture::{CaptureJob, FfmpegRecorder};
use mynah_core::{output, RecorderConfig, StopReason, TerminationMonitor};
use std::path::PathBuf;
use tracing::{info, warn};

#[allow(clippy::too_many_arguments)]
pub fn execute(
    room: String,
    output_dir: PathBuf,
    base_url: String,
    display_name: String,
    audio_sink: String,
    chrome_path: Option<PathBuf>,
    ffmpeg_path: Option<PathBuf>,
) -> Result<()> {
    let config = RecorderConfig {
        base_url,
        display_name,
        output_dir,
        audio_sink,
        chrome_path,
        ffmpeg_path,
        ..Default::default()
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_controller(room, config))
}

/// The join-and-record lifecycle for one room: open a browser session,
/// negotiate entry, start capture, then idle until a stop condition fires
/// and tear everything down in reverse order.
async fn run_controller(room: String, config: RecorderConfig) -> Result<()> {
    let output_path = output::recording_path(&config.output_dir, &room)
        .context("Failed to prepare output directory")?;
    let display = config.display();

    info!("Dispatching recorder to room {} in {}", room, config.resolution());

    // Browser or Chrome being unavailable is fatal; nothing to clean up yet.
    let mut session = Session::open(&config, &room)
        .await
        .context("Failed to open browser session")?;

    // Best-effort by contract: a failed join still records whatever the
    // page shows, which beats losing the dispatch.
    let attempt = JoinNegotiator::new(&config).attempt_join(&session).await;
    info!(
        "Join negotiation done (name submitted: {}, entered via: {})",
        attempt.name_submitted,
        attempt.entered_via.as_deref().unwrap_or("none")
    );

    // Let the meeting surface settle before the first captured frame.
    tokio::time::sleep(config.settle_delay).await;

    let recorder = FfmpegRecorder::new(config.clone());
    let mut job = match recorder.start(&display, &output_path) {
        Ok(job) => job,
        Err(e) => {
            // No recording is possible; close the browser rather than
            // leaving an orphan on the virtual display.
            session.close().await;
            return Err(e).context("Failed to start capture");
        }
    };
    info!("Recording started: {}", output_path.display());

    let watcher = match StopWatcher::install(
        session.page(),
        &config.stop_token,
        config.chat_poll_interval,
    )
    .await
    {
        Ok(watcher) => watcher,
        Err(e) => {
            // Without the stop hook the session could only ever end via the
            // safety timer; treat that as a broken launch.
            job.stop().await;
            session.close().await;
            return Err(e).context("Failed to install stop watchers");
        }
    };

    // The monitor exists for the whole race: every watcher signal goes
    // through its transition guard, and only the one that flips RUNNING to
    // STOPPING owns teardown.
    let mut monitor = TerminationMonitor::new();
    wait_for_stop(watcher, &mut job, &mut monitor, &config).await;

    // Reverse-order teardown: capture first so the file is finalized
    // while the meeting page is still rendering, then the browser.
    job.stop().await;
    session.close().await;
    monitor.finish_stop();

    if monitor.reason().is_some_and(|r| r.is_fatal()) {
        bail!(
            "Capture process exited early; partial recording kept at {}",
            output_path.display()
        );
    }

    info!("Recording saved: {}", output_path.display());
    Ok(())
}

/// Race the stop watchers: the in-page signals, the safety timer and the
/// capture health probe. Every signal is offered to the monitor's
/// transition guard; the function returns once one of them wins the
/// RUNNING to STOPPING transition.
async fn wait_for_stop(
    mut watcher: StopWatcher,
    job: &mut CaptureJob,
    monitor: &mut TerminationMonitor,
    config: &RecorderConfig,
) {
    let deadline = tokio::time::sleep(config.max_duration);
    tokio::pin!(deadline);

    let mut health = tokio::time::interval(config.chat_poll_interval);
    // First tick fires immediately; skip it so a slow encoder spin-up is
    // not mistaken for an early exit.
    health.tick().await;

    let mut page_alive = true;

    loop {
        let signal = tokio::select! {
            _ = &mut deadline => Some(StopReason::SafetyTimeout),
            signal = watcher.recv(), if page_alive => {
                match signal {
                    Some(reason) => Some(reason),
                    None => {
                        // Page or browser went away; the timer and health
                        // probe still cover shutdown.
                        warn!("Stop watcher channel closed; in-band stop unavailable");
                        page_alive = false;
                        None
                    }
                }
            }
            _ = health.tick() => {
                if job.is_running() {
                    None
                } else {
                    Some(StopReason::CaptureExited)
                }
            }
        };

        if let Some(reason) = signal {
            if monitor.begin_stop(reason) {
                return;
            }
        }
    }
}
