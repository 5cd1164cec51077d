use std::time::Duration;

use serde_json::Value;

use crate::models::{CoreError, CoreErrorKind, CoreResult};

/// Outbound JSON POST used by the Telegram and webhook notifiers.
pub trait JsonPoster: Send + Sync {
    fn post_json(&self, url: &str, body: &Value) -> CoreResult<()>;
}

pub struct UreqPoster {
    agent: ureq::Agent,
}

impl UreqPoster {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl JsonPoster for UreqPoster {
    fn post_json(&self, url: &str, body: &Value) -> CoreResult<()> {
        match self.agent.post(url).send_json(body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(CoreError::new(
                CoreErrorKind::DeliveryFailure,
                format!("server returned HTTP {code}"),
            )),
            Err(ureq::Error::Transport(transport)) => Err(CoreError::new(
                CoreErrorKind::DeliveryFailure,
                transport_failure(&transport),
            )),
        }
    }
}

// `Transport`'s Display prefixes the request URL, which may carry a bot token.
fn transport_failure(transport: &ureq::Transport) -> String {
    match transport.message() {
        Some(detail) => format!("transport failure: {}: {detail}", transport.kind()),
        None => format!("transport failure: {}", transport.kind()),
    }
}
