use crate::Result;
use chromiumoxide::cdp::js_protocol::runtime::{
    AddBindingParams, EnableParams, EventBindingCalled,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use mynah_core::StopReason;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Name of the CDP binding the page calls to stop the session. Reachable in
/// the page as `window.mynahStop(payload)`.
pub const STOP_BINDING: &str = "mynahStop";

/// Payload the injected chat watcher sends, distinguishing it from external
/// callers of the hook.
const CHAT_PAYLOAD: &str = "chat-command";

/// In-page stop watchers, bridged to the controller over one channel.
///
/// Two page-world signals share a single crossing point, a `Runtime`
/// binding: an injected interval scanning the chat transcript for the stop
/// token, and any external code that calls the hook directly. The binding's
/// event stream is forwarded into an mpsc channel whose sole consumer is the
/// termination loop; nothing else reads page-world state.
pub struct StopWatcher {
    rx: mpsc::Receiver<StopReason>,
    forward_task: JoinHandle<()>,
}

impl StopWatcher {
    /// Register the stop binding and inject the chat watcher.
    pub async fn install(page: &Page, stop_token: &str, poll_interval: Duration) -> Result<Self> {
        page.execute(EnableParams::default()).await?;
        page.execute(AddBindingParams::new(STOP_BINDING)).await?;

        let mut events = page.event_listener::<EventBindingCalled>().await?;
        let (tx, rx) = mpsc::channel(4);

        let forward_task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.name != STOP_BINDING {
                    continue;
                }
                let reason = if event.payload == CHAT_PAYLOAD {
                    StopReason::ChatCommand
                } else {
                    StopReason::StopHook
                };
                tracing::debug!("Stop binding called with payload {:?}", event.payload);
                if tx.send(reason).await.is_err() {
                    break;
                }
            }
        });

        page.evaluate(chat_watcher_script(stop_token, poll_interval))
            .await?;

        Ok(Self { rx, forward_task })
    }

    /// Next stop signal from the page. `None` means the page or browser is
    /// gone and no further signals can arrive.
    pub async fn recv(&mut self) -> Option<StopReason> {
        self.rx.recv().await
    }
}

impl Drop for StopWatcher {
    fn drop(&mut self) {
        self.forward_task.abort();
    }
}

/// Interval script polling the meeting's chat transcript for the stop token.
fn chat_watcher_script(stop_token: &str, poll_interval: Duration) -> String {
    // serde_json escaping keeps an arbitrary token safe inside the script.
    let token = serde_json::to_string(stop_token).unwrap_or_else(|_| "\"!stop\"".to_string());
    format!(
        r#"(() => {{
            const token = {token};
            setInterval(() => {{
                const messages = document.querySelectorAll('.usermessage');
                if (messages.length > 0) {{
                    const last = messages[messages.length - 1].innerText;
                    if (last.includes(token) && window.{binding}) {{
                        window.{binding}({payload:?});
                    }}
                }}
            }}, {interval});
        }})()"#,
        token = token,
        binding = STOP_BINDING,
        payload = CHAT_PAYLOAD,
        interval = poll_interval.as_millis(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_watcher_script_embeds_token_and_interval() {
        let script = chat_watcher_script("!stop", Duration::from_secs(2));
        assert!(script.contains("\"!stop\""));
        assert!(script.contains("2000"));
        assert!(script.contains(".usermessage"));
        assert!(script.contains("window.mynahStop"));
    }

    #[test]
    fn test_chat_watcher_script_escapes_odd_tokens() {
        let script = chat_watcher_script("st\"op", Duration::from_secs(1));
        assert!(script.contains(r#""st\"op""#));
    }
}
