use crate::{Error, Result};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// Launches the Chrome process a session attaches to.
///
/// The flag set mirrors what the recording deployment needs: kiosk mode on
/// the virtual display, automation hints suppressed so the meeting page does
/// not flag the participant as a bot, fake media-stream UI so the
/// camera/microphone permission prompts auto-accept, and a window sized
/// exactly to the capture resolution. The window size MUST match the capture
/// geometry or the recording letterboxes.
pub struct ChromeLauncher {
    chrome_path: PathBuf,
    profile_path: PathBuf,
    width: u32,
    height: u32,
    debugging_port: u16,
}

impl ChromeLauncher {
    pub fn new(
        chrome_path: PathBuf,
        profile_path: PathBuf,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        Ok(Self {
            chrome_path,
            profile_path,
            width,
            height,
            debugging_port: ephemeral_port()?,
        })
    }

    /// Launch Chrome detached from our stdio.
    pub fn launch(&self) -> Result<Child> {
        let args = self.build_args();

        Command::new(&self.chrome_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch Chrome: {}", e)))
    }

    /// Build Chrome command-line arguments.
    fn build_args(&self) -> Vec<String> {
        vec![
            format!("--remote-debugging-port={}", self.debugging_port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!("--user-data-dir={}", self.profile_path.display()),
            // Keeps navigator.webdriver unset on the meeting page.
            "--disable-blink-features=AutomationControlled".to_string(),
            "--kiosk".to_string(),
            "--disable-infobars".to_string(),
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--use-fake-ui-for-media-stream".to_string(),
            "--autoplay-policy=no-user-gesture-required".to_string(),
            "--start-maximized".to_string(),
            "--window-position=0,0".to_string(),
            format!("--window-size={},{}", self.width, self.height),
            "--disable-dev-shm-usage".to_string(),
            "about:blank".to_string(),
        ]
    }

    pub fn debugging_port(&self) -> u16 {
        self.debugging_port
    }
}

/// Reserve an OS-assigned port for the CDP endpoint.
///
/// Every launcher gets its own port: concurrent recorder instances each own
/// a Chrome, and attaching to a shared well-known port would connect one
/// controller to another controller's browser. The listener is dropped
/// before launch so Chrome can bind the port itself.
fn ephemeral_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| Error::Browser(format!("Could not allocate a debug port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Browser(format!("Could not read back the debug port: {}", e)))?
        .port();
    Ok(port)
}
