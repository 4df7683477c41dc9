pub mod slack;

use slack::SlackNotifier;
use tracing::info;

/// Logs every message and forwards the ones flagged for Slack in the
/// background, prefixed with the bot name.
#[derive(Debug, Clone)]
pub struct Notifier {
    bot_name: String,
    slack: Option<SlackNotifier>,
}

impl Notifier {
    pub fn new(bot_name: impl Into<String>, slack: Option<SlackNotifier>) -> Self {
        Self {
            bot_name: bot_name.into(),
            slack,
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn prefixed(&self, message: &str) -> String {
        format!("[{}] {}", self.bot_name, message)
    }

    pub fn alert(&self, message: &str) {
        info!(bot = %self.bot_name, "{}", message);
        if let Some(slack) = self.slack.clone() {
            let text = self.prefixed(message);
            tokio::spawn(async move { slack.send(&text).await });
        }
    }
}
