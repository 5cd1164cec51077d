use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use rivalwatch_core::config::NotificationSettings;
use rivalwatch_core::models::{
    ChangeEvent, ChangeType, CompetitorId, CoreError, CoreErrorKind, CoreResult,
    NotificationChannel, Severity, SubscriberFilters, SubscriberId,
};
use rivalwatch_core::notifications::{
    EmailNotifier, JsonPoster, MailTransport, NotificationManager, Notifier, OutgoingMail,
    TelegramNotifier, WebhookNotifier,
};
use rivalwatch_core::persistence::InMemoryStore;
use serde_json::{Value, json};
use time::UtcOffset;

const MOSCOW: UtcOffset = time::macros::offset!(+3);

#[derive(Default)]
struct RecordingPoster {
    posts: Mutex<Vec<(String, Value)>>,
    fail_with: Option<String>,
}

impl JsonPoster for RecordingPoster {
    fn post_json(&self, url: &str, body: &Value) -> CoreResult<()> {
        if let Some(message) = &self.fail_with {
            return Err(CoreError::new(CoreErrorKind::DeliveryFailure, message.clone()));
        }
        self.posts
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl MailTransport for RecordingTransport {
    fn send_mail(&self, mail: &OutgoingMail) -> CoreResult<()> {
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

fn revenue_change() -> ChangeEvent {
    ChangeEvent {
        change_type: ChangeType::CriticalUpdate,
        competitor_id: CompetitorId(1),
        competitor_name: "ЦИАН".to_string(),
        field: Some("revenue".to_string()),
        old_value: Some(json!("12.5 млрд ₽ (2024)")),
        new_value: Some(json!("13.75 млрд ₽ (2025)")),
        data: None,
        timestamp: UNIX_EPOCH + Duration::from_millis(1_759_057_385_120),
        severity: Severity::Critical,
        impact: Some("+10.0%".to_string()),
    }
}

fn new_competitor_change() -> ChangeEvent {
    ChangeEvent {
        change_type: ChangeType::NewCompetitor,
        competitor_id: CompetitorId(4),
        competitor_name: "Авито <Недвижимость>".to_string(),
        field: None,
        old_value: None,
        new_value: None,
        data: Some(json!({ "id": 4, "brandName": "Авито <Недвижимость>" })),
        timestamp: UNIX_EPOCH + Duration::from_secs(1_759_057_385),
        severity: Severity::Info,
        impact: None,
    }
}

#[test]
fn telegram_message_lists_change_details() {
    let notifier = TelegramNotifier::new(None, Arc::new(RecordingPoster::default()), MOSCOW);

    let message = notifier.format_message(&revenue_change()).unwrap();

    assert_eq!(
        message,
        "🚨 <b>ЦИАН</b>\n\n\
         <b>Изменение:</b> CRITICAL_UPDATE\n\
         <b>Поле:</b> revenue\n\
         <b>Было:</b> 12.5 млрд ₽ (2024)\n\
         <b>Стало:</b> 13.75 млрд ₽ (2025)\n\
         <b>Влияние:</b> +10.0%\n\
         \n<i>28.09.2025, 14:03:05</i>"
    );
}

#[test]
fn telegram_message_escapes_names_and_skips_missing_values() {
    let notifier = TelegramNotifier::new(None, Arc::new(RecordingPoster::default()), MOSCOW);

    let message = notifier.format_message(&new_competitor_change()).unwrap();

    assert!(message.starts_with("ℹ️ <b>Авито &lt;Недвижимость&gt;</b>"));
    assert!(!message.contains("Поле"));
    assert!(!message.contains("Было"));
    assert!(!message.contains("Влияние"));
}

#[test]
fn before_and_after_lines_need_both_values() {
    let change = ChangeEvent {
        change_type: ChangeType::FieldUpdated,
        field: Some("offices".to_string()),
        old_value: Some(json!(0)),
        new_value: Some(json!(150)),
        severity: Severity::Info,
        impact: Some("Изменение зафиксировано".to_string()),
        ..revenue_change()
    };
    let telegram = TelegramNotifier::new(None, Arc::new(RecordingPoster::default()), MOSCOW);
    let email = EmailNotifier::new(
        "alerts@example.ru",
        Arc::new(RecordingTransport::default()),
        MOSCOW,
    );

    let message = telegram.format_message(&change).unwrap();
    assert!(message.contains("<b>Поле:</b> offices"));
    assert!(!message.contains("Было"));
    assert!(!message.contains("Стало"));

    let body = email.format_body(&change).unwrap();
    assert!(!body.contains("Старое значение"));
    assert!(body.contains("<p><strong>Новое значение:</strong> 150</p>"));
}

#[test]
fn telegram_without_token_does_not_post() {
    let poster = Arc::new(RecordingPoster::default());
    let notifier = TelegramNotifier::new(Some("  ".to_string()), poster.clone(), MOSCOW);

    notifier.send("123456789", &revenue_change()).unwrap();

    assert!(poster.posts.lock().unwrap().is_empty());
}

#[test]
fn telegram_posts_html_message_to_bot_api() {
    let poster = Arc::new(RecordingPoster::default());
    let notifier = TelegramNotifier::new(Some("42:secret".to_string()), poster.clone(), MOSCOW);

    notifier.send("123456789", &revenue_change()).unwrap();

    let posts = poster.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "https://api.telegram.org/bot42:secret/sendMessage");
    assert_eq!(posts[0].1["chat_id"], json!("123456789"));
    assert_eq!(posts[0].1["parse_mode"], json!("HTML"));
}

#[test]
fn telegram_errors_never_leak_the_token() {
    let poster = Arc::new(RecordingPoster {
        fail_with: Some("transport failure: bot42:secret unreachable".to_string()),
        ..RecordingPoster::default()
    });
    let notifier = TelegramNotifier::new(Some("42:secret".to_string()), poster, MOSCOW);

    let error = notifier.send("123456789", &revenue_change()).unwrap_err();

    assert!(!error.message.contains("42:secret"));
    assert_eq!(error.channel, Some(NotificationChannel::Telegram));
    assert_eq!(error.competitor, Some(CompetitorId(1)));
}

#[test]
fn email_has_subject_and_html_body() {
    let transport = Arc::new(RecordingTransport::default());
    let notifier = EmailNotifier::new("alerts@example.ru", transport.clone(), MOSCOW);

    notifier
        .send("analyst@example.ru", &revenue_change())
        .unwrap();

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let mail = &sent[0];
    assert_eq!(mail.from, "alerts@example.ru");
    assert_eq!(mail.to, "analyst@example.ru");
    assert_eq!(mail.subject, "🚨 ЦИАН: CRITICAL_UPDATE");
    assert!(mail.html.starts_with("<h2>Изменение у конкурента: ЦИАН</h2>"));
    assert!(
        mail.html
            .contains("<p><strong>Старое значение:</strong> 12.5 млрд ₽ (2024)</p>")
    );
    assert!(
        mail.html
            .contains("<p><strong>Время:</strong> 28.09.2025, 14:03:05</p>")
    );
    assert!(mail.html.contains("<hr>"));
}

#[test]
fn webhook_payload_uses_iso_timestamp_and_camel_case() {
    let payload = WebhookNotifier::payload(&revenue_change()).unwrap();

    assert_eq!(
        payload,
        json!({
            "timestamp": "2025-09-28T11:03:05.120Z",
            "type": "CRITICAL_UPDATE",
            "severity": "CRITICAL",
            "competitor": { "id": 1, "name": "ЦИАН" },
            "change": {
                "field": "revenue",
                "oldValue": "12.5 млрд ₽ (2024)",
                "newValue": "13.75 млрд ₽ (2025)",
                "impact": "+10.0%"
            }
        })
    );
}

#[test]
fn webhook_payload_for_record_level_change_has_empty_change_block() {
    let payload = WebhookNotifier::payload(&new_competitor_change()).unwrap();

    assert_eq!(payload["type"], json!("NEW_COMPETITOR"));
    assert_eq!(payload["change"], json!({}));
}

#[test]
fn webhook_posts_payload_to_subscriber_url() {
    let poster = Arc::new(RecordingPoster::default());
    let notifier = WebhookNotifier::new(Some(poster.clone()));

    notifier
        .send("https://hooks.example.ru/rivals", &revenue_change())
        .unwrap();

    let posts = poster.posts.lock().unwrap();
    assert_eq!(posts[0].0, "https://hooks.example.ru/rivals");
    assert_eq!(posts[0].1["competitor"]["name"], json!("ЦИАН"));
}

#[test]
fn subscriber_addresses_are_validated_per_channel() {
    let manager = NotificationManager::new(Arc::new(InMemoryStore::new()));

    for (channel, address) in [
        (NotificationChannel::Email, "analyst.example.ru"),
        (NotificationChannel::Email, "@example.ru"),
        (NotificationChannel::Webhook, "ftp://hooks.example.ru"),
        (NotificationChannel::Telegram, "   "),
    ] {
        let error = manager
            .add_subscriber(channel, address, SubscriberFilters::default())
            .unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::InvalidInput, "{address}");
        assert_eq!(error.channel, Some(channel));
    }

    let subscriber = manager
        .add_subscriber(
            NotificationChannel::Email,
            "  analyst@example.ru ",
            SubscriberFilters::default(),
        )
        .unwrap();
    assert_eq!(subscriber.address, "analyst@example.ru");
}

#[test]
fn removed_subscribers_stop_receiving_changes() {
    let poster = Arc::new(RecordingPoster::default());
    let manager = NotificationManager::new(Arc::new(InMemoryStore::new()))
        .with_notifier(Arc::new(WebhookNotifier::new(Some(poster.clone()))));
    let subscriber = manager
        .add_subscriber(
            NotificationChannel::Webhook,
            "https://hooks.example.ru/rivals",
            SubscriberFilters::default(),
        )
        .unwrap();

    assert!(manager.remove_subscriber(subscriber.id).unwrap());
    assert!(!manager.remove_subscriber(SubscriberId(999)).unwrap());

    let report = manager.send_notification(&revenue_change()).unwrap();
    assert_eq!(report.matched, 0);
    assert!(poster.posts.lock().unwrap().is_empty());
}

#[test]
fn field_filter_lets_record_level_changes_through() {
    let filters = SubscriberFilters {
        fields: Some(vec!["employees".to_string()]),
        types: Some(vec![ChangeType::NewCompetitor, ChangeType::CriticalUpdate]),
        ..SubscriberFilters::default()
    };

    assert!(NotificationManager::matches_filters(
        &new_competitor_change(),
        &filters
    ));
    assert!(!NotificationManager::matches_filters(
        &revenue_change(),
        &filters
    ));
}

#[test]
fn manager_from_settings_registers_all_channels() {
    let store = Arc::new(InMemoryStore::new());
    let manager =
        NotificationManager::from_settings(&NotificationSettings::default(), store).unwrap();
    for (channel, address) in [
        (NotificationChannel::Email, "analyst@example.ru"),
        (NotificationChannel::Telegram, "123456789"),
        (NotificationChannel::Webhook, "https://hooks.example.ru/rivals"),
    ] {
        manager
            .add_subscriber(channel, address, SubscriberFilters::default())
            .unwrap();
    }

    // No bot token and webhook delivery off: every channel only logs.
    let report = manager.send_notification(&revenue_change()).unwrap();
    assert_eq!(report.matched, 3);
    assert_eq!(report.delivered, 3);
    assert_eq!(report.skipped, 0);
}
