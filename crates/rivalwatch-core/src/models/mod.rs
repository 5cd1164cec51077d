pub mod change;
pub mod competitor;
pub mod error;
pub mod subscriber;

pub use change::{ChangeEvent, ChangeType, Severity};
pub use competitor::{CompetitorId, CompetitorRecord, parse_snapshot};
pub use error::{CoreError, CoreErrorKind, CoreResult};
pub use subscriber::{
    NewSubscriber, NotificationChannel, Subscriber, SubscriberFilters, SubscriberId,
};
