pub mod email;
pub mod format;
pub mod http;
pub mod telegram;
pub mod webhook;

pub use email::{DEFAULT_EMAIL_FROM, EmailNotifier, LogMailTransport, MailTransport, OutgoingMail};
pub use http::{JsonPoster, UreqPoster};
pub use telegram::TelegramNotifier;
pub use webhook::{WebhookNotifier, WebhookPayload};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::config::NotificationSettings;
use crate::models::{
    ChangeEvent, CoreError, CoreResult, NewSubscriber, NotificationChannel, Subscriber,
    SubscriberFilters, SubscriberId,
};
use crate::persistence::SubscriberStore;

/// Delivers one change to one address over a single channel.
pub trait Notifier: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    fn send(&self, address: &str, change: &ChangeEvent) -> CoreResult<()>;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DeliveryReport {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DeliveryReport {
    pub fn absorb(&mut self, other: DeliveryReport) {
        self.matched += other.matched;
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

pub struct NotificationManager {
    notifiers: HashMap<NotificationChannel, Arc<dyn Notifier>>,
    subscribers: Arc<dyn SubscriberStore>,
}

impl NotificationManager {
    /// A manager with no notifiers; register them with [`Self::with_notifier`].
    pub fn new(subscribers: Arc<dyn SubscriberStore>) -> Self {
        Self {
            notifiers: HashMap::new(),
            subscribers,
        }
    }

    /// Registers the email, Telegram and webhook notifiers described by
    /// `settings`.
    pub fn from_settings(
        settings: &NotificationSettings,
        subscribers: Arc<dyn SubscriberStore>,
    ) -> CoreResult<Self> {
        let offset = settings.utc_offset()?;
        let poster: Arc<dyn JsonPoster> = Arc::new(UreqPoster::new(settings.http_timeout()));
        let email_from = settings
            .email_from
            .clone()
            .unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string());
        let webhook_poster = settings.webhook_delivery.then(|| poster.clone());

        Ok(Self::new(subscribers)
            .with_notifier(Arc::new(EmailNotifier::new(
                email_from,
                Arc::new(LogMailTransport),
                offset,
            )))
            .with_notifier(Arc::new(TelegramNotifier::new(
                settings.telegram_bot_token.clone(),
                poster,
                offset,
            )))
            .with_notifier(Arc::new(WebhookNotifier::new(webhook_poster))))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.insert(notifier.channel(), notifier);
        self
    }

    pub fn add_subscriber(
        &self,
        channel: NotificationChannel,
        address: &str,
        filters: SubscriberFilters,
    ) -> CoreResult<Subscriber> {
        let address = validate_address(channel, address)?;
        let subscriber = self.subscribers.insert_subscriber(&NewSubscriber {
            channel,
            address,
            filters,
            created_at: SystemTime::now(),
        })?;

        tracing::info!(
            subscriber_id = subscriber.id.0,
            channel = channel.as_str(),
            "notification subscriber added"
        );
        Ok(subscriber)
    }

    pub fn remove_subscriber(&self, id: SubscriberId) -> CoreResult<bool> {
        let removed = self.subscribers.remove_subscriber(id)?;
        if removed {
            tracing::info!(subscriber_id = id.0, "notification subscriber removed");
        }
        Ok(removed)
    }

    pub fn subscribers(&self) -> CoreResult<Vec<Subscriber>> {
        self.subscribers.list_subscribers()
    }

    pub fn matches_filters(change: &ChangeEvent, filters: &SubscriberFilters) -> bool {
        filters.matches(change)
    }

    /// Sends `change` to every matching subscriber. Delivery failures are
    /// logged and counted, never returned; only a subscriber lookup failure
    /// is an error.
    pub fn send_notification(&self, change: &ChangeEvent) -> CoreResult<DeliveryReport> {
        let mut report = DeliveryReport::default();

        for subscriber in self.subscribers.list_subscribers()? {
            if !Self::matches_filters(change, &subscriber.filters) {
                continue;
            }
            report.matched += 1;

            let Some(notifier) = self.notifiers.get(&subscriber.channel) else {
                tracing::debug!(
                    subscriber_id = subscriber.id.0,
                    channel = subscriber.channel.as_str(),
                    "no notifier registered for channel"
                );
                report.skipped += 1;
                continue;
            };

            match notifier.send(&subscriber.address, change) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(
                        subscriber_id = subscriber.id.0,
                        channel = subscriber.channel.as_str(),
                        competitor_id = change.competitor_id.0,
                        kind = ?error.kind,
                        message = %error.message,
                        "failed to send notification"
                    );
                }
            }
        }

        Ok(report)
    }
}

fn validate_address(channel: NotificationChannel, address: &str) -> CoreResult<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(CoreError::invalid_input("subscriber address must not be empty")
            .with_channel(channel));
    }

    let valid = match channel {
        NotificationChannel::Email => address
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty()),
        NotificationChannel::Webhook => {
            address.starts_with("http://") || address.starts_with("https://")
        }
        NotificationChannel::Telegram => true,
    };

    if !valid {
        return Err(CoreError::invalid_input(format!(
            "'{address}' is not a valid {} address",
            channel.as_str()
        ))
        .with_channel(channel));
    }

    Ok(address.to_string())
}
