//! User-facing notification side channel.
//!
//! Both the cache service and the task generator report outcomes as toast
//! messages. The library does not render anything itself; a UI consumes the
//! channel, or notifications fall through to the log.

use tokio::sync::mpsc;

/// Severity of a toast message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
  Success,
  Error,
}

/// A single user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
  pub kind: ToastKind,
  pub message: String,
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
  fn success(&self, message: &str);
  fn error(&self, message: &str);
}

/// Notifier that forwards toasts over a channel for a UI to consume.
pub struct ChannelNotifier {
  tx: mpsc::UnboundedSender<Toast>,
}

impl ChannelNotifier {
  /// Create a notifier and the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  fn send(&self, kind: ToastKind, message: &str) {
    // A closed receiver means no UI is listening; nothing to do.
    let _ = self.tx.send(Toast {
      kind,
      message: message.to_string(),
    });
  }
}

impl Notifier for ChannelNotifier {
  fn success(&self, message: &str) {
    self.send(ToastKind::Success, message);
  }

  fn error(&self, message: &str) {
    self.send(ToastKind::Error, message);
  }
}

/// Fallback notifier that writes to the log.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn success(&self, message: &str) {
    tracing::info!("{}", message);
  }

  fn error(&self, message: &str) {
    tracing::error!("{}", message);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_channel_notifier_delivers_toasts() {
    let (notifier, mut rx) = ChannelNotifier::channel();
    notifier.success("synced 3 operations");
    notifier.error("sync failed");

    assert_eq!(
      rx.recv().await,
      Some(Toast {
        kind: ToastKind::Success,
        message: "synced 3 operations".to_string()
      })
    );
    assert_eq!(rx.recv().await.map(|t| t.kind), Some(ToastKind::Error));
  }

  #[test]
  fn test_dropped_receiver_does_not_panic() {
    let (notifier, rx) = ChannelNotifier::channel();
    drop(rx);
    notifier.success("nobody listening");
  }
}
