use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;

const NOTIFY_TITLE: &str = "Meal analysis complete";
const CHANNEL_ID: &str = "offline-analysis";

/// User-visible notification surface for queued requests that finished
/// analyzing after the submitting session ended.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post one notification. Fire-and-forget: failures are logged and never
    /// propagate into queue processing.
    async fn notify(&self, food_name: &str);
}

/// Posts notifications to an external gateway over HTTP. The notification
/// channel is registered once per process before the first post, mirroring
/// platforms that require a channel up front.
pub struct WebhookNotifier {
    http: Client,
    base_url: String,
    channel: OnceCell<()>,
}

impl WebhookNotifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            channel: OnceCell::new(),
        }
    }

    async fn ensure_channel(&self) -> bool {
        self.channel
            .get_or_try_init(|| async {
                self.http
                    .post(format!("{}/channels", self.base_url))
                    .json(&serde_json::json!({
                        "id": CHANNEL_ID,
                        "name": "Offline analysis",
                    }))
                    .send()
                    .await?
                    .error_for_status()?;
                Ok::<(), reqwest::Error>(())
            })
            .await
            .is_ok()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, food_name: &str) {
        if !self.ensure_channel().await {
            tracing::warn!(food = food_name, "channel registration failed; notification dropped");
            return;
        }

        let result = self
            .http
            .post(format!("{}/notify", self.base_url))
            .json(&serde_json::json!({
                "channel": CHANNEL_ID,
                "title": NOTIFY_TITLE,
                "body": format!("Your queued photo turned out to be '{food_name}'."),
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        if let Err(e) = result {
            tracing::warn!(error = %e, food = food_name, "failed to post notification");
        }
    }
}

/// Fallback when no gateway is configured: the notification becomes a log
/// line instead of disappearing.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, food_name: &str) {
        tracing::info!(food = food_name, "queued meal analyzed");
    }
}
