//! User-facing notifications
//!
//! `notify` is fire-and-forget. Without the user's permission alerts are
//! dropped silently.

use crate::domain::models::{Alert, AppEvent};
use tokio::sync::mpsc;
use tracing::info;

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Writes alerts to the log under the `fog_control::notify` target.
pub struct TracingNotifier {
    granted: bool,
}

impl TracingNotifier {
    pub fn new(granted: bool) -> Self {
        Self { granted }
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, body: &str) {
        if self.granted {
            info!(target: "fog_control::notify", "{}: {}", title, body);
        }
    }
}

/// Forwards alerts to the front end as [`AppEvent::Alert`].
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<AppEvent>,
    granted: bool,
}

impl ChannelNotifier {
    pub fn new(sender: mpsc::UnboundedSender<AppEvent>, granted: bool) -> Self {
        Self { sender, granted }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, title: &str, body: &str) {
        if !self.granted {
            return;
        }
        let _ = self.sender.send(AppEvent::Alert(Alert::new(title, body)));
    }
}
