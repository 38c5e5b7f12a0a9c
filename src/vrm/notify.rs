// Notification collaborator. Delivery is best-effort: the orchestrator logs
// failures and keeps going, a lost email never loses a generated list.

use log::info;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(display("Notification failed: {message}"))]
pub struct NotifyError {
    pub message: String,
}

pub type NotifyResult<T> = Result<T, NotifyError>;

pub trait Notifier {
    fn send(&self, subject: &str, body: &str, recipients: &[String]) -> NotifyResult<()>;
}

/// Writes notifications to the log instead of sending mail. This is the
/// delivery channel for local runs.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, subject: &str, body: &str, recipients: &[String]) -> NotifyResult<()> {
        info!(
            "notification to [{}] subject={:?}: {}",
            recipients.join(", "),
            subject,
            body
        );
        Ok(())
    }
}
