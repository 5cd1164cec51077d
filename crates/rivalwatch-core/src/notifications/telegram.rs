use std::sync::Arc;

use serde_json::json;
use time::UtcOffset;

use crate::models::{ChangeEvent, CoreResult, NotificationChannel};
use crate::notifications::Notifier;
use crate::notifications::format::{display_value, escape_html, format_local_timestamp, present};
use crate::notifications::http::JsonPoster;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    bot_token: Option<String>,
    poster: Arc<dyn JsonPoster>,
    offset: UtcOffset,
}

impl TelegramNotifier {
    /// Without a bot token messages are only written to the log.
    pub fn new(
        bot_token: Option<String>,
        poster: Arc<dyn JsonPoster>,
        offset: UtcOffset,
    ) -> Self {
        Self {
            bot_token: bot_token.filter(|token| !token.trim().is_empty()),
            poster,
            offset,
        }
    }

    pub fn format_message(&self, change: &ChangeEvent) -> CoreResult<String> {
        let mut message = format!(
            "{} <b>{}</b>\n\n",
            change.severity.emoji(),
            escape_html(&change.competitor_name)
        );
        message.push_str(&format!("<b>Изменение:</b> {}\n", change.change_type.as_str()));

        if let Some(field) = change.field_name() {
            message.push_str(&format!("<b>Поле:</b> {}\n", escape_html(field)));
        }

        if let (Some(old_value), Some(new_value)) = (
            present(change.old_value.as_ref()),
            present(change.new_value.as_ref()),
        ) {
            message.push_str(&format!(
                "<b>Было:</b> {}\n",
                escape_html(&display_value(old_value))
            ));
            message.push_str(&format!(
                "<b>Стало:</b> {}\n",
                escape_html(&display_value(new_value))
            ));
        }

        if let Some(impact) = change.impact.as_deref() {
            message.push_str(&format!("<b>Влияние:</b> {}\n", escape_html(impact)));
        }

        let timestamp = format_local_timestamp(change.timestamp, self.offset)?;
        message.push_str(&format!("\n<i>{timestamp}</i>"));

        Ok(message)
    }
}

impl Notifier for TelegramNotifier {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Telegram
    }

    fn send(&self, address: &str, change: &ChangeEvent) -> CoreResult<()> {
        let message = self.format_message(change)?;

        let Some(token) = self.bot_token.as_deref() else {
            tracing::info!(chat_id = %address, %message, "telegram notification recorded");
            return Ok(());
        };

        let payload = json!({
            "chat_id": address,
            "text": message,
            "parse_mode": "HTML",
        });
        let url = format!("{TELEGRAM_API_BASE}/bot{token}/sendMessage");

        self.poster.post_json(&url, &payload).map_err(|mut error| {
            error.message = error.message.replace(token, "<redacted>");
            error
                .with_competitor(change.competitor_id)
                .with_channel(NotificationChannel::Telegram)
        })
    }
}
