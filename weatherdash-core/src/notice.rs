use std::fmt;

use tokio::sync::mpsc;

/// User-facing, non-blocking notification (a toast in a GUI, a line in the CLI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Success(msg) | Notice::Error(msg) => msg,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

pub trait Notifier: Send + Sync + fmt::Debug {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to a receiver owned by the front end.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            tracing::debug!("notice receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify(Notice::Success("a".into()));
        notifier.notify(Notice::Error("b".into()));

        assert_eq!(rx.try_recv().ok(), Some(Notice::Success("a".into())));
        let second = rx.try_recv().expect("second notice");
        assert!(second.is_error());
        assert_eq!(second.to_string(), "b");
    }

    #[test]
    fn dropped_receiver_is_not_fatal() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(Notice::Success("ignored".into()));
    }
}
