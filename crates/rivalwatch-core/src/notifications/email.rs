use std::sync::Arc;

use time::UtcOffset;

use crate::models::{ChangeEvent, CoreResult, NotificationChannel};
use crate::notifications::Notifier;
use crate::notifications::format::{display_value, escape_html, format_local_timestamp, present};

pub const DEFAULT_EMAIL_FROM: &str = "noreply@realty-competitors.com";

const FOOTER: &str =
    "<p><small>Уведомление от системы мониторинга конкурентов RealtyCompetitors</small></p>";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

pub trait MailTransport: Send + Sync {
    fn send_mail(&self, mail: &OutgoingMail) -> CoreResult<()>;
}

/// Records mail in the log instead of handing it to an SMTP relay.
pub struct LogMailTransport;

impl MailTransport for LogMailTransport {
    fn send_mail(&self, mail: &OutgoingMail) -> CoreResult<()> {
        tracing::info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            "email notification recorded"
        );
        Ok(())
    }
}

pub struct EmailNotifier {
    from: String,
    transport: Arc<dyn MailTransport>,
    offset: UtcOffset,
}

impl EmailNotifier {
    pub fn new(
        from: impl Into<String>,
        transport: Arc<dyn MailTransport>,
        offset: UtcOffset,
    ) -> Self {
        Self {
            from: from.into(),
            transport,
            offset,
        }
    }

    pub fn format_subject(change: &ChangeEvent) -> String {
        format!(
            "{} {}: {}",
            change.severity.emoji(),
            change.competitor_name,
            change.change_type.as_str()
        )
    }

    pub fn format_body(&self, change: &ChangeEvent) -> CoreResult<String> {
        let mut lines = vec![
            format!(
                "<h2>Изменение у конкурента: {}</h2>",
                escape_html(&change.competitor_name)
            ),
            paragraph("Тип изменения", change.change_type.as_str()),
            paragraph("Критичность", change.severity.as_str()),
        ];

        if let Some(field) = change.field_name() {
            lines.push(paragraph("Поле", &escape_html(field)));
        }
        if let Some(old_value) = present(change.old_value.as_ref()) {
            lines.push(paragraph(
                "Старое значение",
                &escape_html(&display_value(old_value)),
            ));
        }
        if let Some(new_value) = present(change.new_value.as_ref()) {
            lines.push(paragraph(
                "Новое значение",
                &escape_html(&display_value(new_value)),
            ));
        }
        if let Some(impact) = change.impact.as_deref() {
            lines.push(paragraph("Влияние", &escape_html(impact)));
        }

        let timestamp = format_local_timestamp(change.timestamp, self.offset)?;
        lines.push(paragraph("Время", &timestamp));
        lines.push("<hr>".to_string());
        lines.push(FOOTER.to_string());

        Ok(lines.join("\n"))
    }
}

impl Notifier for EmailNotifier {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    fn send(&self, address: &str, change: &ChangeEvent) -> CoreResult<()> {
        let mail = OutgoingMail {
            from: self.from.clone(),
            to: address.to_string(),
            subject: Self::format_subject(change),
            html: self.format_body(change)?,
        };
        self.transport
            .send_mail(&mail)
            .map_err(|error| error.with_channel(NotificationChannel::Email))
    }
}

fn paragraph(label: &str, value: &str) -> String {
    format!("<p><strong>{label}:</strong> {value}</p>")
}
