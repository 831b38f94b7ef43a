use crate::{Result, Session};
use async_trait::async_trait;
use chromiumoxide::page::Page;
use mynah_core::RecorderConfig;
use std::time::Duration;

/// Selector for the pre-join display-name input.
const NAME_FIELD: &str = r#"input[field-name="displayName"]"#;

/// Anything that signals the pre-join screen has rendered.
const PREJOIN_PROBE: &str = r#"input[field-name="displayName"], [aria-label="Join meeting"], [data-testid="prejoin.joinMeeting"]"#;

/// Generic clickable elements scanned by the text fallback.
const CANDIDATE_BUTTONS: &str = r#"div[role="button"]"#;

/// Diagnostic record of how (or whether) a session got into the meeting.
/// Never persisted; it only feeds the logs.
#[derive(Debug, Default, Clone)]
pub struct JoinAttempt {
    /// Whether a display name was typed and submitted.
    pub name_submitted: bool,
    /// Name of the entry strategy that clicked a join control, if any.
    pub entered_via: Option<String>,
}

impl JoinAttempt {
    pub fn joined(&self) -> bool {
        self.entered_via.is_some()
    }
}

/// One way of getting past the pre-join screen. Strategies are probed in
/// priority order until one reports success; a failing strategy never aborts
/// negotiation.
#[async_trait]
pub trait JoinStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Try to enter the meeting. `Ok(true)` means a control was clicked,
    /// `Ok(false)` means this strategy found nothing to click.
    async fn try_enter(&self, page: &Page) -> Result<bool>;
}

/// Clicks a join control known by exact selector.
pub struct KnownSelector {
    name: &'static str,
    selector: &'static str,
}

impl KnownSelector {
    pub fn new(name: &'static str, selector: &'static str) -> Self {
        Self { name, selector }
    }
}

#[async_trait]
impl JoinStrategy for KnownSelector {
    fn name(&self) -> &str {
        self.name
    }

    async fn try_enter(&self, page: &Page) -> Result<bool> {
        match page.find_element(self.selector).await {
            Ok(element) => {
                element.click().await?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }
}

/// Last-resort entry: scan every generic clickable element and click the
/// first whose visible text looks like a join control. Covers markup that
/// renamed or restyled the button, and "Ask to Join" moderated rooms.
pub struct TextScan {
    keywords: &'static [&'static str],
}

impl TextScan {
    pub fn new(keywords: &'static [&'static str]) -> Self {
        Self { keywords }
    }
}

#[async_trait]
impl JoinStrategy for TextScan {
    fn name(&self) -> &str {
        "text-scan"
    }

    async fn try_enter(&self, page: &Page) -> Result<bool> {
        let buttons = page.find_elements(CANDIDATE_BUTTONS).await?;
        for button in buttons {
            let text = button.inner_text().await.ok().flatten().unwrap_or_default();
            if text_indicates_join(&text, self.keywords) {
                tracing::debug!("Text fallback clicking element with text {:?}", text);
                button.click().await?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Case-insensitive keyword match on an element's visible text.
fn text_indicates_join(text: &str, keywords: &[&str]) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// The standard probe order: known selectors first, generic text scan last.
pub fn default_strategies() -> Vec<Box<dyn JoinStrategy>> {
    vec![
        Box::new(KnownSelector::new(
            "labeled-join-button",
            r#"[aria-label="Join meeting"]"#,
        )),
        Box::new(KnownSelector::new(
            "prejoin-testid",
            r#"[data-testid="prejoin.joinMeeting"]"#,
        )),
        Box::new(KnownSelector::new("toolbox-button", ".toolbox-button")),
        Box::new(TextScan::new(&["join", "ask"])),
    ]
}

/// Best-effort negotiation from "page loaded" to "inside the meeting".
///
/// This layer is markup-dependent by construction, so it is total over DOM
/// states: every failure is logged and absorbed, and the controller records
/// whatever the page shows afterwards. A blank-screen recording beats a lost
/// dispatch.
pub struct JoinNegotiator {
    strategies: Vec<Box<dyn JoinStrategy>>,
    display_name: String,
    settle_delay: Duration,
    submit_delay: Duration,
}

impl JoinNegotiator {
    pub fn new(config: &RecorderConfig) -> Self {
        Self::with_strategies(config, default_strategies())
    }

    pub fn with_strategies(
        config: &RecorderConfig,
        strategies: Vec<Box<dyn JoinStrategy>>,
    ) -> Self {
        Self {
            strategies,
            display_name: config.display_name.clone(),
            settle_delay: config.settle_delay,
            submit_delay: config.submit_delay,
        }
    }

    /// Run the negotiation. Infallible by contract: the outer controller
    /// proceeds to recording whatever happens here.
    pub async fn attempt_join(&self, session: &Session) -> JoinAttempt {
        let mut attempt = JoinAttempt::default();

        if session
            .wait_for(PREJOIN_PROBE, self.settle_delay)
            .await
            .is_none()
        {
            tracing::debug!("Pre-join UI never appeared within settle window");
        }

        match self.submit_display_name(session.page()).await {
            Ok(submitted) => attempt.name_submitted = submitted,
            Err(e) => tracing::warn!("Name submission failed (continuing): {}", e),
        }

        for strategy in &self.strategies {
            match strategy.try_enter(session.page()).await {
                Ok(true) => {
                    attempt.entered_via = Some(strategy.name().to_string());
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Join strategy {} failed (continuing): {}", strategy.name(), e)
                }
            }
        }

        match &attempt.entered_via {
            Some(strategy) => tracing::info!("Entered meeting via {}", strategy),
            None => tracing::warn!("No join control matched; recording the page as-is"),
        }
        attempt
    }

    /// Fill and submit the display-name field if the page has one.
    async fn submit_display_name(&self, page: &Page) -> Result<bool> {
        let field = match page.find_element(NAME_FIELD).await {
            Ok(field) => field,
            Err(_) => return Ok(false),
        };

        field.click().await?;
        // Select any pre-filled contents so typing replaces them.
        page.evaluate(format!(
            "document.querySelector('{}')?.select()",
            NAME_FIELD
        ))
        .await?;
        field.type_str(&self.display_name).await?;
        field.press_key("Enter").await?;

        // Let the submission register before probing for join controls.
        tokio::time::sleep(self.submit_delay).await;
        Ok(true)
    }
}
