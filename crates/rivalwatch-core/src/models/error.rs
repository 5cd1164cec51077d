use crate::models::{CompetitorId, NotificationChannel};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    InvalidInput,
    ParseFailure,
    StorageFailure,
    DeliveryFailure,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub competitor: Option<CompetitorId>,
    pub channel: Option<NotificationChannel>,
    pub kind: CoreErrorKind,
    pub message: String,
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            competitor: None,
            channel: None,
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::InvalidInput, message)
    }

    pub fn delivery(channel: NotificationChannel, message: impl Into<String>) -> Self {
        Self {
            channel: Some(channel),
            ..Self::new(CoreErrorKind::DeliveryFailure, message)
        }
    }

    pub fn with_competitor(mut self, competitor: CompetitorId) -> Self {
        self.competitor = Some(competitor);
        self
    }

    pub fn with_channel(mut self, channel: NotificationChannel) -> Self {
        self.channel = Some(channel);
        self
    }
}
